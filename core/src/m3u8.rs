use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist};
use url::Url;

use crate::error::{DownloadError, DownloadResult};

pub fn parse_playlist(content: &[u8]) -> DownloadResult<Playlist> {
    match m3u8_rs::parse_playlist(content) {
        Ok((_, playlist)) => Ok(playlist),
        Err(_) => Err(DownloadError::Manifest(
            "failed to parse m3u8 playlist".to_string(),
        )),
    }
}

pub fn select_best_variant(master: &MasterPlaylist) -> Option<String> {
    master
        .variants
        .iter()
        .max_by_key(|variant| variant.bandwidth)
        .map(|variant| variant.uri.clone())
}

/// Resolve a playlist reference against the manifest's own URL. Absolute
/// references pass through unchanged.
pub fn resolve_reference(manifest_url: &str, reference: &str) -> DownloadResult<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(reference.to_string());
    }
    let base = Url::parse(manifest_url).map_err(|err| {
        DownloadError::Manifest(format!("invalid manifest url {manifest_url}: {err}"))
    })?;
    let resolved = base
        .join(reference)
        .map_err(|err| DownloadError::Manifest(format!("cannot resolve {reference}: {err}")))?;
    Ok(resolved.to_string())
}

/// Segment URLs in strict manifest order. Out-of-order concatenation
/// corrupts the video.
pub fn resolve_segment_urls(
    media: &MediaPlaylist,
    manifest_url: &str,
) -> DownloadResult<Vec<String>> {
    media
        .segments
        .iter()
        .map(|segment| resolve_reference(manifest_url, &segment.uri))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST_URL: &str = "https://cdn.example/video/index.m3u8";

    #[test]
    fn relative_reference_resolves_against_manifest_base() {
        assert_eq!(
            resolve_reference(MANIFEST_URL, "seg1.ts").unwrap(),
            "https://cdn.example/video/seg1.ts"
        );
    }

    #[test]
    fn absolute_reference_passes_through_unchanged() {
        assert_eq!(
            resolve_reference(MANIFEST_URL, "https://other.cdn/seg1.ts").unwrap(),
            "https://other.cdn/seg1.ts"
        );
    }

    #[test]
    fn segment_order_matches_manifest_order() {
        let manifest = b"#EXTM3U\n\
            #EXT-X-VERSION:3\n\
            #EXT-X-TARGETDURATION:4\n\
            #EXTINF:4.0,\n\
            a.ts\n\
            #EXTINF:4.0,\n\
            b.ts\n\
            #EXTINF:4.0,\n\
            c.ts\n\
            #EXT-X-ENDLIST\n";
        let Playlist::MediaPlaylist(media) = parse_playlist(manifest).unwrap() else {
            panic!("expected media playlist");
        };
        let urls = resolve_segment_urls(&media, MANIFEST_URL).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example/video/a.ts",
                "https://cdn.example/video/b.ts",
                "https://cdn.example/video/c.ts",
            ]
        );
    }

    #[test]
    fn best_variant_is_highest_bandwidth() {
        let manifest = b"#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
            low/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720\n\
            high/index.m3u8\n";
        let Playlist::MasterPlaylist(master) = parse_playlist(manifest).unwrap() else {
            panic!("expected master playlist");
        };
        assert_eq!(
            select_best_variant(&master).as_deref(),
            Some("high/index.m3u8")
        );
    }
}
