// Acquisition of remote media into the session workspace
//
// Fetches are validated (success status, supported content type) and
// streamed to disk. Transient failures (timeouts, 5xx) are retried by the
// shared bounded-backoff policy; permanent 4xx responses fail immediately.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use stitcher_core::{Result, RetryPolicy, StitchError};

/// Content type prefixes accepted for downloaded media. Some CDNs serve
/// video as octet-stream, so that is allowed through.
const SUPPORTED_CONTENT_TYPES: &[&str] = &["video/", "audio/", "application/octet-stream"];

/// Seam for fetching a remote asset to a local file
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Production fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StitchError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StitchError::download(url, format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(StitchError::download_permanent(
                url,
                format!("HTTP {status}"),
            ));
        }
        if !status.is_success() {
            return Err(StitchError::download(url, format!("HTTP {status}")));
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !SUPPORTED_CONTENT_TYPES
                .iter()
                .any(|p| content_type.starts_with(p))
            {
                return Err(StitchError::download_permanent(
                    url,
                    format!("unsupported content type {content_type}"),
                ));
            }
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| StitchError::Internal(anyhow::anyhow!(
                "failed to create {}: {e}",
                dest.display()
            )))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| StitchError::download(url, format!("read failed: {e}")))?;
            tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
                .await
                .map_err(|e| StitchError::Internal(anyhow::anyhow!(
                    "failed to write {}: {e}",
                    dest.display()
                )))?;
        }
        tokio::io::AsyncWriteExt::flush(&mut file)
            .await
            .map_err(|e| StitchError::Internal(e.into()))?;

        debug!(url, dest = %dest.display(), "Download complete");
        Ok(())
    }
}

/// Fetch one asset with the shared retry policy and a per-download
/// wall-clock budget. A timeout counts as a transient download failure.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    retry: &RetryPolicy,
    timeout: Duration,
    url: &str,
    dest: &Path,
) -> Result<()> {
    retry
        .run("download", || async {
            match tokio::time::timeout(timeout, fetcher.fetch(url, dest)).await {
                Ok(result) => result,
                Err(_) => Err(StitchError::download(
                    url,
                    format!("timed out after {}s", timeout.as_secs()),
                )),
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyFetcher {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl Fetcher for FlakyFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(StitchError::download(url, "HTTP 503"));
            }
            tokio::fs::write(dest, b"media").await.unwrap();
            Ok(())
        }
    }

    struct NotFoundFetcher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Fetcher for NotFoundFetcher {
        async fn fetch(&self, url: &str, _dest: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StitchError::download_permanent(url, "HTTP 404"))
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let fetcher = FlakyFetcher {
            calls: AtomicU32::new(0),
            fail_first: 2,
        };

        fetch_with_retry(
            &fetcher,
            &quick_retry(),
            Duration::from_secs(5),
            "https://cdn.example.com/clip.mp4",
            &dest,
        )
        .await
        .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn permanent_404_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = NotFoundFetcher {
            calls: AtomicU32::new(0),
        };

        let err = fetch_with_retry(
            &fetcher,
            &quick_retry(),
            Duration::from_secs(5),
            "https://cdn.example.com/missing.mp4",
            &dir.path().join("missing.mp4"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "DownloadError");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_fetch_times_out_as_download_error() {
        struct HangingFetcher;

        #[async_trait]
        impl Fetcher for HangingFetcher {
            async fn fetch(&self, _url: &str, _dest: &Path) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let err = fetch_with_retry(
            &HangingFetcher,
            &RetryPolicy::none(),
            Duration::from_millis(10),
            "https://cdn.example.com/slow.mp4",
            &dir.path().join("slow.mp4"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "DownloadError");
        assert!(err.to_string().contains("timed out"));
    }
}
