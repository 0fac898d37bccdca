use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Read-only configuration surface of the downloader. Constructed once by
/// the host and handed to [`crate::StreamDownloader::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Base directory for all downloaded files. A file existing here under
    /// its deterministic name is treated as a completed download.
    pub cache_dir: PathBuf,
    /// Per-asset size ceiling in megabytes.
    pub max_size_mb: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Headers sent with every request; per-call extra headers override.
    pub default_headers: HashMap<String, String>,
    pub proxy: Option<String>,
    pub video_chunk_size: usize,
    pub media_chunk_size: usize,
}

impl DownloaderConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("mediadl"),
            max_size_mb: 100,
            connect_timeout_secs: 5,
            request_timeout_secs: 60,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
                .to_string(),
            default_headers: HashMap::new(),
            proxy: None,
            video_chunk_size: 1024 * 1024,
            media_chunk_size: 64 * 1024,
        }
    }
}
