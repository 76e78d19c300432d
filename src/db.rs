use crate::types::{Grid, KeyValueDict, NormalizedReport};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not encode report column: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("could not create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("database lock poisoned")]
    Poisoned,
}

/// A normalized report plus the request metadata it was uploaded with.
pub struct NewReport<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub phone_number: &'a str,
    pub image_url: &'a str,
    pub report: &'a NormalizedReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReport {
    pub id: String,
    pub created_at: String,
    pub user_id: String,
    pub phone_number: String,
    pub image_url: String,
    pub report_date: Option<String>,
    pub key_value_data: KeyValueDict,
    pub full_text: String,
    pub tables_raw: Vec<Grid>,
    pub raw_ocr: serde_json::Value,
}

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn new(db_path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(&db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS reports (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                user_id TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                image_url TEXT NOT NULL,
                report_date TEXT,
                key_value_data TEXT NOT NULL,
                full_text TEXT NOT NULL,
                tables_raw TEXT NOT NULL,
                raw_ocr TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reports_user ON reports(user_id);
            ",
        )?;
        Ok(Db {
            conn: Mutex::new(conn),
        })
    }

    /// Insert (or replace, for a retried id) a processed report. Returns its id.
    pub fn save_report(&self, new: &NewReport<'_>) -> Result<String, DbError> {
        let key_value_data = serde_json::to_string(&new.report.key_value_data)?;
        let tables_raw = serde_json::to_string(&new.report.tables)?;
        let raw_ocr = serde_json::to_string(&new.report.raw_ocr)?;
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO reports
             (id, created_at, user_id, phone_number, image_url, report_date,
              key_value_data, full_text, tables_raw, raw_ocr)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.id,
                now,
                new.user_id,
                new.phone_number,
                new.image_url,
                new.report.report_date,
                key_value_data,
                new.report.full_text,
                tables_raw,
                raw_ocr,
            ],
        )?;
        Ok(new.id.to_string())
    }

    pub fn get_report(&self, id: &str) -> Result<Option<StoredReport>, DbError> {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        let row = conn
            .query_row(
                "SELECT id, created_at, user_id, phone_number, image_url, report_date,
                        key_value_data, full_text, tables_raw, raw_ocr
                 FROM reports WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                },
            )
            .optional()?;
        let Some((
            id,
            created_at,
            user_id,
            phone_number,
            image_url,
            report_date,
            key_value_data,
            full_text,
            tables_raw,
            raw_ocr,
        )) = row
        else {
            return Ok(None);
        };
        Ok(Some(StoredReport {
            id,
            created_at,
            user_id,
            phone_number,
            image_url,
            report_date,
            key_value_data: serde_json::from_str(&key_value_data)?,
            full_text,
            tables_raw: serde_json::from_str(&tables_raw)?,
            raw_ocr: serde_json::from_str(&raw_ocr)?,
        }))
    }
}
