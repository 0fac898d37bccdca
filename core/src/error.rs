use thiserror::Error;

/// All outcomes a download can fail with. `ZeroSize` and `SizeLimit` are
/// soft conditions: policy rejections a caller may skip per-item instead of
/// failing the whole post.
///
/// The enum is `Clone` so every waiter attached to a deduplicated in-flight
/// download observes the same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("request failed with status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("media size is zero")]
    ZeroSize,
    #[error("media size {actual_bytes} bytes exceeds limit of {limit_bytes} bytes")]
    SizeLimit { actual_bytes: u64, limit_bytes: u64 },
    #[error("manifest error: {0}")]
    Manifest(String),
    #[error("merge failed: {0}")]
    Merge(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DownloadError {
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            DownloadError::ZeroSize | DownloadError::SizeLimit { .. }
        )
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;
