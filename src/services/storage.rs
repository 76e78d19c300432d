//! Report image upload to S3.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use bytes::Bytes;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Image upload failed: {0}")]
    Upload(String),
}

/// Destination for uploaded report images. Returns the public URL of the stored object.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        image: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

pub struct S3ImageStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl S3ImageStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, region: String) -> Self {
        S3ImageStore {
            client,
            bucket,
            region,
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn upload(
        &self,
        key: &str,
        image: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = image.len();
        // No ACL: the bucket has object ACLs disabled.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(image))
            .send()
            .await
            .map_err(|e| StorageError::Upload(DisplayErrorContext(&e).to_string()))?;
        info!(bucket = %self.bucket, key, size, "uploaded report image");
        Ok(self.object_url(key))
    }
}

/// Object key for a report image; the extension follows the uploaded content type.
pub fn object_key(report_id: &str, content_type: &str) -> String {
    let ext = match content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "image/jpeg" | "image/jpg" => "jpg",
        "application/pdf" => "pdf",
        "image/tiff" => "tiff",
        "image/bmp" => "bmp",
        "image/heif" | "image/heic" => "heif",
        _ => "png",
    };
    format!("reports/{}.{}", report_id, ext)
}
