use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use mediadl_core::{DownloadError, DownloaderConfig, StreamDownloader};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let downloader = match build_downloader() {
        Ok(downloader) => downloader,
        Err(err) => {
            eprintln!("error: {}", err);
            return;
        }
    };

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "video" => run_single(&args, 2, |url| downloader.download_video(url, None, None)),
        "audio" => run_single(&args, 2, |url| downloader.download_audio(url, None, None)),
        "image" => run_single(&args, 2, |url| downloader.download_img(url, None, None)),
        "m3u8" => run_single(&args, 2, |url| downloader.download_m3u8(url, None, None)),
        "batch" => {
            let urls: Vec<String> = args[2..].to_vec();
            if urls.is_empty() {
                print_usage();
                return;
            }
            let total = urls.len();
            let paths = downloader.download_many_best_effort(&urls, None);
            println!("downloaded {}/{} items", paths.len(), total);
            for path in paths {
                println!("{}", path.display());
            }
        }
        "merge" => {
            let (Some(video_url), Some(audio_url), Some(output)) =
                (args.get(2), args.get(3), args.get(4))
            else {
                print_usage();
                return;
            };
            match downloader.download_av_and_merge(
                video_url,
                audio_url,
                &PathBuf::from(output),
                None,
            ) {
                Ok(path) => println!("{}", path.display()),
                Err(err) => report_error(&err),
            }
        }
        _ => print_usage(),
    }
}

fn run_single<F>(args: &[String], idx: usize, f: F)
where
    F: FnOnce(&str) -> Result<PathBuf, DownloadError>,
{
    let Some(url) = args.get(idx) else {
        print_usage();
        return;
    };
    match f(url) {
        Ok(path) => println!("{}", path.display()),
        Err(err) => report_error(&err),
    }
}

fn report_error(err: &DownloadError) {
    if err.is_soft() {
        eprintln!("skipped: {}", err);
    } else {
        eprintln!("error: {}", err);
    }
}

fn build_downloader() -> Result<StreamDownloader, DownloadError> {
    let mut config = DownloaderConfig::default();
    if let Ok(dir) = env::var("MEDIADL_CACHE_DIR") {
        config.cache_dir = PathBuf::from(dir);
    }
    if let Ok(value) = env::var("MEDIADL_MAX_MB") {
        if let Ok(mb) = value.parse::<u64>() {
            config.max_size_mb = mb;
        }
    }
    if let Ok(proxy) = env::var("MEDIADL_PROXY") {
        config.proxy = Some(proxy);
    }
    if let Ok(referer) = env::var("MEDIADL_REFERER") {
        let mut headers = HashMap::new();
        headers.insert("referer".to_string(), referer);
        config.default_headers = headers;
    }
    StreamDownloader::new(config)
}

fn print_usage() {
    eprintln!(
        "Usage: mediadl-cli <command> [args]\n\
Commands:\n\
  video <url>                     Download a video stream to the cache\n\
  audio <url>                     Download an audio stream to the cache\n\
  image <url>                     Download an image to the cache\n\
  m3u8 <url>                      Download a segmented (HLS) video\n\
  batch <url>...                  Download images, skipping failures\n\
  merge <v-url> <a-url> <output>  Download A/V streams and mux with ffmpeg\n\
Environment:\n\
  MEDIADL_CACHE_DIR   Cache directory (default: system temp)\n\
  MEDIADL_MAX_MB      Per-asset size ceiling in MB (default: 100)\n\
  MEDIADL_PROXY       Proxy URL for all requests\n\
  MEDIADL_REFERER     Referer header sent with every request"
    );
}
