//! Object storage sink for the original resume documents.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload transport failure: {0}")]
    TransportFailure(String),
}

impl UploadError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransportFailure(_) => "transport-failure",
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the document and returns its public URL.
    async fn upload(
        &self,
        path: &Path,
        display_name: &str,
        owner_id: Uuid,
    ) -> Result<String, UploadError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        path: &Path,
        display_name: &str,
        owner_id: Uuid,
    ) -> Result<String, UploadError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::TransportFailure(format!("cannot read document: {e}")))?;

        let key = object_key(owner_id, display_name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type("application/pdf")
            .send()
            .await
            .map_err(|e| UploadError::TransportFailure(format!("S3 upload failed: {e}")))?;

        info!("Uploaded resume to s3://{}/{}", self.bucket, key);
        Ok(format!("{}/{}", self.public_base_url, key))
    }
}

/// `resumes/{owner}/{name}` with the display name reduced to a URL-safe form.
fn object_key(owner_id: Uuid, display_name: &str) -> String {
    let safe: String = display_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.replace("..", "_");
    let safe = safe.trim_matches('.');
    let safe = if safe.is_empty() { "resume.pdf" } else { safe };
    format!("resumes/{owner_id}/{safe}")
}
