use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use crate::error::{DownloadError, DownloadResult};

/// Combines a video-only stream and an audio-only stream into one container
/// without re-encoding.
pub trait Muxer: Send + Sync {
    fn merge(&self, video: &Path, audio: &Path, output: &Path) -> DownloadResult<()>;
}

/// Stream-copy muxing via an external ffmpeg binary.
pub struct FfmpegMuxer {
    binary: PathBuf,
}

impl FfmpegMuxer {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for FfmpegMuxer {
    fn merge(&self, video: &Path, audio: &Path, output: &Path) -> DownloadResult<()> {
        info!(output = %output.display(), "merging audio and video streams");
        let status = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c", "copy"])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| {
                DownloadError::Merge(format!("failed to run {}: {}", self.binary.display(), err))
            })?;
        if !status.success() {
            return Err(DownloadError::Merge(format!("ffmpeg exited with {status}")));
        }
        Ok(())
    }
}
