// Artifact publication
//
// Uploads the final joined artifact to the external object store. Transient
// storage errors go through the shared bounded-backoff policy before the
// session is failed; no partial artifact is ever published.

use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use stitcher_core::{ObjectStore, Result, RetryPolicy, StitchError};

/// Object key for a session's final artifact
pub fn artifact_key(session_id: Uuid) -> String {
    format!("stitched-videos/{session_id}.mp4")
}

/// Upload the artifact, returning its durable URL
pub async fn publish_artifact(
    objects: &dyn ObjectStore,
    retry: &RetryPolicy,
    timeout: Duration,
    session_id: Uuid,
    path: &Path,
) -> Result<String> {
    let key = artifact_key(session_id);
    let url = retry
        .run("upload", || async {
            match tokio::time::timeout(timeout, objects.put(&key, path)).await {
                Ok(result) => result,
                Err(_) => Err(StitchError::upload(format!(
                    "timed out after {}s",
                    timeout.as_secs()
                ))),
            }
        })
        .await?;
    info!(session_id = %session_id, url = %url, "Artifact published");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use stitcher_core::InMemoryObjectStore;

    #[tokio::test]
    async fn publishes_under_the_session_key() {
        let store = InMemoryObjectStore::new();
        let session_id = Uuid::now_v7();
        let url = publish_artifact(
            &store,
            &RetryPolicy::none(),
            Duration::from_secs(5),
            session_id,
            Path::new("/ws/final.mp4"),
        )
        .await
        .unwrap();

        assert!(url.contains(&session_id.to_string()));
        assert_eq!(store.keys().await, vec![artifact_key(session_id)]);
    }

    #[tokio::test]
    async fn transient_upload_failures_are_retried() {
        struct FlakyStore {
            calls: AtomicU32,
        }

        #[async_trait]
        impl ObjectStore for FlakyStore {
            async fn put(&self, key: &str, _path: &Path) -> Result<String> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StitchError::upload("connection reset"))
                } else {
                    Ok(format!("https://store.example.com/{key}"))
                }
            }
        }

        let store = FlakyStore {
            calls: AtomicU32::new(0),
        };
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
        };
        let url = publish_artifact(
            &store,
            &retry,
            Duration::from_secs(5),
            Uuid::now_v7(),
            Path::new("/ws/final.mp4"),
        )
        .await
        .unwrap();
        assert!(url.starts_with("https://store.example.com/"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
