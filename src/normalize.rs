//! Turns a completed Azure analyze operation into a [`NormalizedReport`].
//!
//! Everything in here is pure: no I/O, no shared state. The upload handler calls
//! [`normalize`] once per request.

use crate::types::{AnalyzeResult, Grid, KeyValueDict, NormalizedReport};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error(
        "table {table}: cell ({row}, {column}) is outside the declared {row_count}x{column_count} grid"
    )]
    MalformedTable {
        table: usize,
        row: i64,
        column: i64,
        row_count: usize,
        column_count: usize,
    },
    #[error("table {table}: declared {row_count}x{column_count} grid exceeds the cell limit")]
    OversizedTable {
        table: usize,
        row_count: usize,
        column_count: usize,
    },
    #[error("analyzeResult has an unexpected shape: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Upper bound on a declared grid. A scanned report page never comes close.
pub const MAX_TABLE_CELLS: usize = 100_000;

/// Date shapes tried against the full text, in priority order.
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b\d{1,2}[-/]\d{1,2}[-/]\d{2,4}\b",
        r"(?i)\b\d{4}[-/]\d{1,2}[-/]\d{1,2}\b",
        r"(?i)\b\d{1,2}\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{4}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Read `analyzeResult` out of the operation document. A missing result is treated as empty.
pub fn parse_analyze_result(raw: &Value) -> Result<AnalyzeResult, NormalizeError> {
    match raw.get("analyzeResult") {
        None | Some(Value::Null) => Ok(AnalyzeResult::default()),
        Some(v) => Ok(AnalyzeResult::deserialize(v)?),
    }
}

/// All recognized text in reading order.
///
/// Paragraphs are preferred since they already merge soft line-wraps; page lines are only
/// used when the service produced no paragraph segmentation.
pub fn extract_full_text(result: &AnalyzeResult) -> String {
    if !result.paragraphs.is_empty() {
        return result
            .paragraphs
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
    }

    let mut full_text = String::new();
    for page in &result.pages {
        let page_text = page
            .lines
            .iter()
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        full_text.push_str(&page_text);
        full_text.push('\n');
    }
    full_text.trim().to_string()
}

/// One grid per source table, in document order. A cell outside its table's declared
/// bounds rejects the whole document.
pub fn extract_tables(result: &AnalyzeResult) -> Result<Vec<Grid>, NormalizeError> {
    let mut grids = Vec::with_capacity(result.tables.len());
    for (table_idx, table) in result.tables.iter().enumerate() {
        // A zero-width table still allocates one row vector per declared row.
        let declared = table.row_count.checked_mul(table.column_count.max(1));
        if declared.map_or(true, |n| n > MAX_TABLE_CELLS) {
            return Err(NormalizeError::OversizedTable {
                table: table_idx,
                row_count: table.row_count,
                column_count: table.column_count,
            });
        }
        let mut grid = vec![vec![String::new(); table.column_count]; table.row_count];
        for cell in &table.cells {
            let position = usize::try_from(cell.row_index)
                .ok()
                .zip(usize::try_from(cell.column_index).ok())
                .filter(|&(r, c)| r < table.row_count && c < table.column_count);
            match position {
                Some((r, c)) => grid[r][c] = cell.content.clone(),
                None => {
                    return Err(NormalizeError::MalformedTable {
                        table: table_idx,
                        row: cell.row_index,
                        column: cell.column_index,
                        row_count: table.row_count,
                        column_count: table.column_count,
                    })
                }
            }
        }
        grids.push(grid);
    }
    Ok(grids)
}

/// Converts the first table into `test_name -> value`, assuming a two-column layout
/// such as `[["HB", "12.1"], ["WBC", "6.5"]]`. Later duplicate keys win.
pub fn table_to_dict(tables: &[Grid]) -> KeyValueDict {
    let mut dict = KeyValueDict::new();
    let Some(table) = tables.first() else {
        return dict;
    };
    for row in table {
        if row.len() < 2 {
            continue;
        }
        let key = row[0].trim().replace(' ', "_").to_lowercase();
        dict.insert(key, row[1].trim().to_string());
    }
    dict
}

/// First plausible report date: a "date" key-value pair if the service found one,
/// otherwise the first regex hit in the full text. The raw string is returned as-is.
pub fn extract_report_date(result: &AnalyzeResult, full_text: &str) -> Option<String> {
    for kv in &result.key_value_pairs {
        let value = kv.value.as_ref().map(|v| v.content.as_str()).unwrap_or("");
        if kv.key.content.to_lowercase().contains("date") && !value.is_empty() {
            debug!(key = %kv.key.content, "report date taken from key-value pair");
            return Some(value.to_string());
        }
    }

    for (idx, pattern) in DATE_PATTERNS.iter().enumerate() {
        if let Some(m) = pattern.find(full_text) {
            debug!(pattern = idx, "report date matched in full text");
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// Full pipeline: text, tables, key-value data (from tables), then date (from text).
pub fn normalize(raw: &Value) -> Result<NormalizedReport, NormalizeError> {
    let result = parse_analyze_result(raw)?;
    debug!(
        pages = result.pages.len(),
        paragraphs = result.paragraphs.len(),
        tables = result.tables.len(),
        key_value_pairs = result.key_value_pairs.len(),
        "normalizing analyze result"
    );

    let full_text = extract_full_text(&result);
    let tables = extract_tables(&result)?;
    let key_value_data = table_to_dict(&tables);
    let report_date = extract_report_date(&result, &full_text);

    Ok(NormalizedReport {
        full_text,
        tables,
        key_value_data,
        report_date,
        raw_ocr: raw.clone(),
    })
}
