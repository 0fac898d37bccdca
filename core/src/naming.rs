use sha2::{Digest, Sha256};
use url::Url;

const KNOWN_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".ico", ".heic", ".heif", ".svg", ".mp4",
    ".m4s", ".ts", ".flv", ".mov", ".webm", ".mp3", ".m4a", ".aac", ".flac", ".wav", ".ogg",
];

/// Derive a deterministic cache file name from a URL. The extension comes
/// from the URL path when it carries a recognized media suffix, otherwise
/// `default_ext` applies.
pub fn derive_file_name(url: &str, default_ext: &str) -> String {
    let ext = extension_from_url(url).unwrap_or(default_ext);
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    format!("{}{}", hex::encode(&digest[..16]), ext)
}

/// Reduce a caller-supplied file name to a single safe path component.
/// Returns `None` when nothing usable remains; the caller falls back to the
/// derived name.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let mut out = String::new();
    let mut last_was_sep = false;
    for ch in name.chars() {
        let allowed = ch.is_ascii_alphanumeric()
            || matches!(ch, '.' | '_' | '-' | ' ' | '(' | ')' | '[' | ']');
        let mapped = if allowed { ch } else { '_' };
        if mapped == '_' || mapped == ' ' {
            if last_was_sep {
                continue;
            }
            last_was_sep = true;
        } else {
            last_was_sep = false;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches(&[' ', '.', '_'][..]);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn extension_from_url(url: &str) -> Option<&'static str> {
    let path = Url::parse(url).ok()?.path().to_ascii_lowercase();
    KNOWN_EXTENSIONS
        .iter()
        .copied()
        .find(|ext| path.ends_with(ext))
}
