pub mod config;
pub mod downloader;
pub mod error;
pub mod m3u8;
pub mod memo;
pub mod merge;
pub mod naming;
pub mod net;
pub mod progress;


pub use crate::config::DownloaderConfig;
pub use crate::downloader::StreamDownloader;
pub use crate::error::{DownloadError, DownloadResult};
