// HTTP object store client
//
// Publishes final artifacts by PUT to an S3-compatible HTTP endpoint. The
// returned URL uses the public base, which may differ from the upload base
// when a CDN fronts the bucket.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use stitcher_core::{ObjectStore, Result, StitchError};

#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    upload_base: String,
    public_base: String,
}

impl HttpObjectStore {
    pub fn new(upload_base: &str, public_base: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StitchError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            upload_base: upload_base.trim_end_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }

    /// Read ARTIFACT_STORE_URL (required) and ARTIFACT_PUBLIC_URL (defaults
    /// to the store URL).
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let upload_base = std::env::var("ARTIFACT_STORE_URL").map_err(|_| {
            StitchError::Internal(anyhow::anyhow!(
                "ARTIFACT_STORE_URL environment variable required"
            ))
        })?;
        let public_base = std::env::var("ARTIFACT_PUBLIC_URL").unwrap_or_else(|_| upload_base.clone());
        Self::new(&upload_base, &public_base, timeout)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            StitchError::Internal(anyhow::anyhow!("failed to read {}: {e}", path.display()))
        })?;

        let url = format!("{}/{key}", self.upload_base);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StitchError::upload(format!("PUT {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(StitchError::upload(format!(
                "PUT {url} returned HTTP {}",
                response.status()
            )));
        }

        let public_url = format!("{}/{key}", self.public_base);
        debug!(key, url = %public_url, "Artifact uploaded");
        Ok(public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_normalized() {
        let store = HttpObjectStore::new(
            "https://bucket.example.com/",
            "https://cdn.example.com/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(store.upload_base, "https://bucket.example.com");
        assert_eq!(store.public_base, "https://cdn.example.com");
    }
}
