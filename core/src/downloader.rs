use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, warn};

use crate::config::DownloaderConfig;
use crate::error::{DownloadError, DownloadResult};
use crate::m3u8;
use crate::memo::TaskMemoizer;
use crate::merge::{FfmpegMuxer, Muxer};
use crate::naming::{derive_file_name, sanitize_file_name};
use crate::net::{AssetRequest, NetClient, ReqwestNetClient};
use crate::progress::{ProgressHandle, ProgressRegistry};

/// Streaming media downloader with cache, size-limit enforcement and
/// in-flight deduplication. Constructed once and shared by reference.
pub struct StreamDownloader {
    config: DownloaderConfig,
    net: Arc<dyn NetClient>,
    muxer: Arc<dyn Muxer>,
    progress: ProgressRegistry,
    memo: TaskMemoizer,
}

impl StreamDownloader {
    pub fn new(config: DownloaderConfig) -> DownloadResult<Self> {
        let net = ReqwestNetClient::new(&config)?;
        Ok(Self {
            config,
            net: Arc::new(net),
            muxer: Arc::new(FfmpegMuxer::new()),
            progress: ProgressRegistry::new(),
            memo: TaskMemoizer::new(),
        })
    }

    pub fn with_net_client(mut self, net: Box<dyn NetClient>) -> Self {
        self.net = Arc::from(net);
        self
    }

    pub fn with_muxer(mut self, muxer: Box<dyn Muxer>) -> Self {
        self.muxer = Arc::from(muxer);
        self
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressRegistry {
        &self.progress
    }

    /// Download a URL's body to the cache with a chunked streaming GET.
    /// An existing cache file is returned as-is; overlapping requests for
    /// the same cache path collapse onto one transfer.
    pub fn download(
        &self,
        url: &str,
        file_name: Option<String>,
        extra_headers: Option<&HashMap<String, String>>,
        chunk_size: usize,
    ) -> DownloadResult<PathBuf> {
        let file_name = file_name
            .and_then(|name| sanitize_file_name(&name))
            .unwrap_or_else(|| derive_file_name(url, ".bin"));
        let path = self.config.cache_dir.join(&file_name);
        let request = self.build_request(url, extra_headers);
        self.memo.run_deduplicated(&path, || {
            self.fetch_to_cache(&request, &path, &file_name, chunk_size)
        })
    }

    pub fn download_video(
        &self,
        url: &str,
        file_name: Option<String>,
        extra_headers: Option<&HashMap<String, String>>,
    ) -> DownloadResult<PathBuf> {
        let name = file_name.unwrap_or_else(|| derive_file_name(url, ".mp4"));
        self.download(url, Some(name), extra_headers, self.config.video_chunk_size)
    }

    pub fn download_audio(
        &self,
        url: &str,
        file_name: Option<String>,
        extra_headers: Option<&HashMap<String, String>>,
    ) -> DownloadResult<PathBuf> {
        let name = file_name.unwrap_or_else(|| derive_file_name(url, ".mp3"));
        self.download(url, Some(name), extra_headers, self.config.media_chunk_size)
    }

    pub fn download_img(
        &self,
        url: &str,
        file_name: Option<String>,
        extra_headers: Option<&HashMap<String, String>>,
    ) -> DownloadResult<PathBuf> {
        let name = file_name.unwrap_or_else(|| derive_file_name(url, ".jpg"));
        self.download(url, Some(name), extra_headers, self.config.media_chunk_size)
    }

    /// Fetch a set of image URLs concurrently, skipping individual
    /// failures. Successes are returned in input order.
    pub fn download_many_best_effort(
        &self,
        urls: &[String],
        extra_headers: Option<&HashMap<String, String>>,
    ) -> Vec<PathBuf> {
        thread::scope(|scope| {
            let handles: Vec<_> = urls
                .iter()
                .map(|url| scope.spawn(move || self.download_img(url.as_str(), None, extra_headers)))
                .collect();
            let mut paths = Vec::with_capacity(urls.len());
            for (url, handle) in urls.iter().zip(handles) {
                match handle.join() {
                    Ok(Ok(path)) => paths.push(path),
                    Ok(Err(err)) => warn!(url = %url, error = %err, "skipping failed gallery item"),
                    Err(_) => warn!(url = %url, "gallery download thread panicked"),
                }
            }
            paths
        })
    }

    /// Download a video-only stream and an audio-only stream concurrently,
    /// then mux them into `output_path`.
    pub fn download_av_and_merge(
        &self,
        video_url: &str,
        audio_url: &str,
        output_path: &Path,
        extra_headers: Option<&HashMap<String, String>>,
    ) -> DownloadResult<PathBuf> {
        self.memo.run_deduplicated(output_path, || {
            if output_path.exists() {
                debug!(path = %output_path.display(), "merged output already cached");
                return Ok(output_path.to_path_buf());
            }
            let (video, audio) = thread::scope(|scope| {
                let video = scope.spawn(|| self.download_video(video_url, None, extra_headers));
                let audio = scope.spawn(|| self.download_audio(audio_url, None, extra_headers));
                (join_download(video), join_download(audio))
            });
            let video = video?;
            let audio = audio?;
            // ffmpeg can die after partially writing the output; a leftover
            // file would pass the cache check above on the next call.
            let mut guard = PartialFile::new(output_path);
            self.muxer.merge(&video, &audio, output_path)?;
            guard.disarm();
            Ok(output_path.to_path_buf())
        })
    }

    /// Download an HLS-style segmented video as one concatenated file.
    /// Segments are appended strictly in manifest order.
    pub fn download_m3u8(
        &self,
        manifest_url: &str,
        file_name: Option<String>,
        extra_headers: Option<&HashMap<String, String>>,
    ) -> DownloadResult<PathBuf> {
        let file_name = file_name.unwrap_or_else(|| derive_file_name(manifest_url, ".ts"));
        let path = self.config.cache_dir.join(&file_name);
        let request = self.build_request(manifest_url, extra_headers);
        self.memo
            .run_deduplicated(&path, || self.fetch_m3u8_to_cache(&request, &path, &file_name))
    }

    fn build_request(
        &self,
        url: &str,
        extra_headers: Option<&HashMap<String, String>>,
    ) -> AssetRequest {
        let mut headers = self.config.default_headers.clone();
        if let Some(extra) = extra_headers {
            for (key, value) in extra {
                headers.insert(key.clone(), value.clone());
            }
        }
        AssetRequest {
            url: url.to_string(),
            headers,
        }
    }

    fn fetch_to_cache(
        &self,
        request: &AssetRequest,
        path: &Path,
        description: &str,
        chunk_size: usize,
    ) -> DownloadResult<PathBuf> {
        if path.exists() {
            debug!(url = %request.url, path = %path.display(), "cache hit");
            return Ok(path.to_path_buf());
        }
        fs::create_dir_all(&self.config.cache_dir)
            .map_err(|err| DownloadError::Io(err.to_string()))?;

        let response = self.net.get_stream(request)?;
        if !response.is_success() {
            return Err(DownloadError::Status(response.status));
        }

        let limit = self.config.max_size_bytes();
        if let Some(declared) = response.content_length {
            if declared == 0 {
                warn!(url = %request.url, "media has zero declared size, skipping");
                return Err(DownloadError::ZeroSize);
            }
            if declared > limit {
                warn!(url = %request.url, declared, limit, "media exceeds size limit, skipping");
                return Err(DownloadError::SizeLimit {
                    actual_bytes: declared,
                    limit_bytes: limit,
                });
            }
        }

        let handle = self.progress.acquire(description, response.content_length);
        match self.stream_to_file(response.body, path, chunk_size, limit, &handle) {
            Ok(bytes) => {
                info!(url = %request.url, bytes, path = %path.display(), "download complete");
                Ok(path.to_path_buf())
            }
            Err(err) => {
                if err.is_soft() {
                    warn!(url = %request.url, error = %err, "download rejected, partial file removed");
                } else {
                    error!(url = %request.url, error = %err, "download failed, partial file removed");
                }
                Err(err)
            }
        }
    }

    fn stream_to_file(
        &self,
        mut body: Box<dyn Read + Send>,
        path: &Path,
        chunk_size: usize,
        limit: u64,
        handle: &ProgressHandle,
    ) -> DownloadResult<u64> {
        let mut guard = PartialFile::new(path);
        let mut file = File::create(path).map_err(|err| DownloadError::Io(err.to_string()))?;
        let mut buffer = vec![0u8; chunk_size];
        let mut written: u64 = 0;
        loop {
            let read = body
                .read(&mut buffer)
                .map_err(|err| DownloadError::Network(err.to_string()))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .map_err(|err| DownloadError::Io(err.to_string()))?;
            written += read as u64;
            handle.advance(read as u64);
            if written > limit {
                return Err(DownloadError::SizeLimit {
                    actual_bytes: written,
                    limit_bytes: limit,
                });
            }
        }
        if written == 0 {
            // An empty file in the cache would count as completion proof.
            return Err(DownloadError::ZeroSize);
        }
        file.flush().map_err(|err| DownloadError::Io(err.to_string()))?;
        drop(file);
        guard.disarm();
        Ok(written)
    }

    fn fetch_m3u8_to_cache(
        &self,
        request: &AssetRequest,
        path: &Path,
        description: &str,
    ) -> DownloadResult<PathBuf> {
        if path.exists() {
            debug!(url = %request.url, path = %path.display(), "cache hit");
            return Ok(path.to_path_buf());
        }
        fs::create_dir_all(&self.config.cache_dir)
            .map_err(|err| DownloadError::Io(err.to_string()))?;

        let (media, media_url) = self.fetch_media_playlist(request, 0)?;
        let segment_urls = m3u8::resolve_segment_urls(&media, &media_url)?;
        if segment_urls.is_empty() {
            return Err(DownloadError::Manifest(
                "playlist has no segments".to_string(),
            ));
        }

        let limit = self.config.max_size_bytes();
        let handle = self.progress.acquire(description, None);
        let mut guard = PartialFile::new(path);
        let mut file = File::create(path).map_err(|err| DownloadError::Io(err.to_string()))?;
        let mut buffer = vec![0u8; self.config.media_chunk_size];
        let mut written: u64 = 0;

        for segment_url in &segment_urls {
            let segment_request = AssetRequest {
                url: segment_url.clone(),
                headers: request.headers.clone(),
            };
            let response = self.net.get_stream(&segment_request)?;
            if !response.is_success() {
                error!(url = %segment_url, status = response.status, "segment fetch failed");
                return Err(DownloadError::Status(response.status));
            }
            if let Some(len) = response.content_length {
                handle.grow_total(len);
            }
            let mut body = response.body;
            loop {
                let read = body
                    .read(&mut buffer)
                    .map_err(|err| DownloadError::Network(err.to_string()))?;
                if read == 0 {
                    break;
                }
                file.write_all(&buffer[..read])
                    .map_err(|err| DownloadError::Io(err.to_string()))?;
                written += read as u64;
                handle.advance(read as u64);
                if written > limit {
                    warn!(url = %request.url, written, limit, "segmented video exceeds size limit");
                    return Err(DownloadError::SizeLimit {
                        actual_bytes: written,
                        limit_bytes: limit,
                    });
                }
            }
        }

        if written == 0 {
            return Err(DownloadError::ZeroSize);
        }
        file.flush().map_err(|err| DownloadError::Io(err.to_string()))?;
        drop(file);
        guard.disarm();
        info!(
            url = %request.url,
            segments = segment_urls.len(),
            bytes = written,
            path = %path.display(),
            "segmented download complete"
        );
        Ok(path.to_path_buf())
    }

    fn fetch_media_playlist(
        &self,
        request: &AssetRequest,
        depth: u8,
    ) -> DownloadResult<(m3u8_rs::MediaPlaylist, String)> {
        let response = self.net.get_stream(request)?;
        if !response.is_success() {
            return Err(DownloadError::Status(response.status));
        }
        let mut content = Vec::new();
        let mut body = response.body;
        body.read_to_end(&mut content)
            .map_err(|err| DownloadError::Network(err.to_string()))?;

        match m3u8::parse_playlist(&content)? {
            m3u8_rs::Playlist::MediaPlaylist(media) => Ok((media, request.url.clone())),
            m3u8_rs::Playlist::MasterPlaylist(master) => {
                if depth >= 1 {
                    return Err(DownloadError::Manifest(
                        "nested master playlists".to_string(),
                    ));
                }
                let variant = m3u8::select_best_variant(&master).ok_or_else(|| {
                    DownloadError::Manifest("master playlist has no variants".to_string())
                })?;
                let variant_url = m3u8::resolve_reference(&request.url, &variant)?;
                debug!(url = %variant_url, "selected highest-bandwidth variant");
                let variant_request = AssetRequest {
                    url: variant_url,
                    headers: request.headers.clone(),
                };
                self.fetch_media_playlist(&variant_request, depth + 1)
            }
        }
    }
}

fn join_download(
    handle: thread::ScopedJoinHandle<'_, DownloadResult<PathBuf>>,
) -> DownloadResult<PathBuf> {
    handle
        .join()
        .unwrap_or_else(|_| Err(DownloadError::Internal("download thread panicked".to_string())))
}

// Removes the partially written file on drop unless disarmed.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove partial file");
            }
        }
    }
}
