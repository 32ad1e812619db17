// Pipeline configuration
//
// Loaded once at startup from environment variables and shared (via Arc)
// with every pipeline execution.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Configuration for pipeline executions
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory under which per-session workspaces are created
    pub work_dir: PathBuf,
    /// Bounded fan-out for concurrent downloads within one session
    pub download_fanout: usize,
    /// Bounded concurrency for segment normalization within one session
    pub encode_concurrency: usize,
    /// Wall-clock budget per download
    pub download_timeout: Duration,
    /// Wall-clock budget per encode/mix/concat invocation
    pub encode_timeout: Duration,
    /// Wall-clock budget for artifact upload
    pub upload_timeout: Duration,
    /// Shared bounded-backoff policy for network-class operations
    pub retry: RetryPolicy,
    /// Terminal sessions older than this are removed by the retention sweep
    pub retention: Duration,
    /// Interval between retention sweeps
    pub sweep_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("stitcher"),
            download_fanout: 4,
            encode_concurrency: 2,
            download_timeout: Duration::from_secs(120),
            encode_timeout: Duration::from_secs(600),
            upload_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("STITCHER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            download_fanout: env_usize("STITCHER_DOWNLOAD_FANOUT", defaults.download_fanout),
            encode_concurrency: env_usize(
                "STITCHER_ENCODE_CONCURRENCY",
                defaults.encode_concurrency,
            ),
            download_timeout: env_secs("STITCHER_DOWNLOAD_TIMEOUT_SECS", defaults.download_timeout),
            encode_timeout: env_secs("STITCHER_ENCODE_TIMEOUT_SECS", defaults.encode_timeout),
            upload_timeout: env_secs("STITCHER_UPLOAD_TIMEOUT_SECS", defaults.upload_timeout),
            retry: defaults.retry,
            retention: env_secs(
                "STITCHER_RETENTION_SECS",
                defaults.retention,
            ),
            sweep_interval: env_secs("STITCHER_SWEEP_INTERVAL_SECS", defaults.sweep_interval),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
