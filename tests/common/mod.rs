//! Fake collaborators for driving the upload API without AWS, Azure, or a webhook.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use axum_test::TestServer;
use lab_report_scanner::db::Db;
use lab_report_scanner::ocr::{DocumentAnalyzer, OcrError};
use lab_report_scanner::routes::{router, AppState};
use lab_report_scanner::services::notify::{Notifier, NotifyError};
use lab_report_scanner::services::storage::{ImageStore, StorageError};
use lab_report_scanner::types::NotificationPayload;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub size: usize,
    pub content_type: String,
}

#[derive(Default)]
pub struct FakeImageStore {
    pub fail: bool,
    pub objects: Mutex<Vec<StoredObject>>,
}

#[async_trait]
impl ImageStore for FakeImageStore {
    async fn upload(
        &self,
        key: &str,
        image: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::Upload("AccessDenied".to_string()));
        }
        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            size: image.len(),
            content_type: content_type.to_string(),
        });
        Ok(format!("https://lab-reports.s3.eu-west-1.amazonaws.com/{}", key))
    }
}

pub enum AnalyzerReply {
    Document(Value),
    Timeout,
    Rejected,
}

pub struct FakeAnalyzer {
    pub reply: AnalyzerReply,
    pub calls: Mutex<u32>,
}

impl FakeAnalyzer {
    pub fn new(reply: AnalyzerReply) -> Self {
        FakeAnalyzer {
            reply,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _image: Bytes) -> Result<Value, OcrError> {
        *self.calls.lock().unwrap() += 1;
        match &self.reply {
            AnalyzerReply::Document(doc) => Ok(doc.clone()),
            AnalyzerReply::Timeout => Err(OcrError::Timeout { attempts: 15 }),
            AnalyzerReply::Rejected => Err(OcrError::Submission {
                status: StatusCode::UNAUTHORIZED,
                body: "Access denied due to invalid subscription key".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    pub sent: Mutex<Vec<NotificationPayload>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Status(StatusCode::SERVICE_UNAVAILABLE));
        }
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

pub struct Harness {
    pub server: TestServer,
    pub images: Arc<FakeImageStore>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub notifier: Arc<RecordingNotifier>,
    pub db: Arc<Db>,
}

pub fn harness(images: FakeImageStore, reply: AnalyzerReply, notifier: RecordingNotifier) -> Harness {
    let images = Arc::new(images);
    let analyzer = Arc::new(FakeAnalyzer::new(reply));
    let notifier = Arc::new(notifier);
    let db = Arc::new(Db::open_in_memory().unwrap());
    let state = AppState {
        images: images.clone(),
        analyzer: analyzer.clone(),
        db: db.clone(),
        notifier: notifier.clone(),
    };
    Harness {
        server: TestServer::new(router(state, 1024 * 1024)).unwrap(),
        images,
        analyzer,
        notifier,
        db,
    }
}

/// Completed operation for a two-row blood panel with a dated key-value pair.
pub fn blood_panel_document() -> Value {
    json!({
        "status": "succeeded",
        "createdDateTime": "2024-05-12T09:00:00Z",
        "analyzeResult": {
            "apiVersion": "2023-07-31",
            "modelId": "prebuilt-document",
            "content": "Sunrise Diagnostics\nHB 12.1\nWBC 6.5",
            "pages": [{
                "pageNumber": 1,
                "lines": [
                    {"content": "Sunrise Diagnostics"},
                    {"content": "HB 12.1"},
                    {"content": "WBC 6.5"}
                ]
            }],
            "paragraphs": [
                {"role": "title", "content": "Sunrise Diagnostics"},
                {"content": "Collected on 5 Jan 2024 at the lab"}
            ],
            "tables": [{
                "rowCount": 2,
                "columnCount": 2,
                "cells": [
                    {"rowIndex": 0, "columnIndex": 0, "content": "HB"},
                    {"rowIndex": 0, "columnIndex": 1, "content": "12.1"},
                    {"rowIndex": 1, "columnIndex": 0, "content": "WBC"},
                    {"rowIndex": 1, "columnIndex": 1, "content": "6.5"}
                ]
            }],
            "keyValuePairs": [
                {"key": {"content": "Patient"}, "value": {"content": "J. Doe"}, "confidence": 0.9},
                {"key": {"content": "Report Date"}, "value": {"content": "12/05/2024"}, "confidence": 0.95}
            ]
        }
    })
}
