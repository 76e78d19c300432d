use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fully materialized table: rows x columns, missing cells filled with "".
pub type Grid = Vec<Vec<String>>;

/// Normalized test name -> result value, taken from the primary results table.
pub type KeyValueDict = BTreeMap<String, String>;

/// The `analyzeResult` object of a completed Azure Document Intelligence operation.
/// Only the parts the normalizer reads are modelled; everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeResult {
    pub content: String,
    pub pages: Vec<OcrPage>,
    pub paragraphs: Vec<OcrParagraph>,
    pub tables: Vec<OcrTable>,
    pub key_value_pairs: Vec<OcrKeyValuePair>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrPage {
    pub page_number: u32,
    pub lines: Vec<OcrLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrLine {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrParagraph {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrTable {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<OcrTableCell>,
}

/// Indices are signed so that a malformed negative index is reported, not a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrTableCell {
    pub row_index: i64,
    pub column_index: i64,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrKeyValuePair {
    pub key: OcrKeyValueElement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<OcrKeyValueElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrKeyValueElement {
    pub content: String,
}

/// Consumer-facing record built from one completed OCR operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReport {
    pub full_text: String,
    pub tables: Vec<Grid>,
    pub key_value_data: KeyValueDict,
    pub report_date: Option<String>,
    /// Complete operation document as received from the OCR service.
    pub raw_ocr: serde_json::Value,
}

/// Body returned by `POST /report/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub message: String,
    pub report_id: String,
    pub image_url: String,
    pub key_value_data: KeyValueDict,
    pub report_date: Option<String>,
    /// Set when the downstream webhook could not be notified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_warning: Option<String>,
}

/// Subset of a report forwarded to the automation webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub report_id: String,
    pub user_id: String,
    pub phone_number: String,
    pub key_value_data: KeyValueDict,
    pub report_date: Option<String>,
    pub image_url: String,
}
