use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set in .env or environment")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub azure_endpoint: String,
    pub azure_key: String,
    pub azure_model_id: String,
    pub azure_api_version: String,
    pub ocr_poll_interval: Duration,
    pub ocr_poll_attempts: u32,
    pub aws_region: String,
    pub s3_bucket: String,
    pub database_path: PathBuf,
    pub webhook_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub max_upload_bytes: usize,
}

impl Settings {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let database_path = match get("DATABASE_PATH") {
            Some(p) => PathBuf::from(p),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lab-report-scanner")
                .join("lab_reports.db"),
        };

        Ok(Settings {
            azure_endpoint: required("AZURE_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            azure_key: required("AZURE_KEY")?,
            azure_model_id: get("AZURE_MODEL_ID").unwrap_or_else(|| "prebuilt-document".into()),
            azure_api_version: get("AZURE_API_VERSION").unwrap_or_else(|| "2023-07-31".into()),
            ocr_poll_interval: Duration::from_millis(parse_or(
                "OCR_POLL_INTERVAL_MS",
                get("OCR_POLL_INTERVAL_MS"),
                1000,
            )?),
            ocr_poll_attempts: parse_or("OCR_POLL_ATTEMPTS", get("OCR_POLL_ATTEMPTS"), 15)?,
            aws_region: required("AWS_REGION")?,
            s3_bucket: required("S3_BUCKET_NAME")?,
            database_path,
            webhook_url: get("N8N_WEBHOOK_URL"),
            bind_addr: parse_or(
                "BIND_ADDR",
                get("BIND_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], 8000)),
            )?,
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), 20 * 1024 * 1024)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
