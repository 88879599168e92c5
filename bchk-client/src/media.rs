//! Media URL resolution
//!
//! Only http(s) YouTube links with a non-empty path are accepted. Anything
//! else is a local validation failure and never reaches the service.

use url::Url;

const YOUTUBE_HOSTS: &[&str] = &[
    "www.youtube.com",
    "youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtu.be",
];

/// Canonical video URL for `raw`, or `None` if it cannot be analyzed
///
/// # Examples
///
/// ```
/// use bchk_client::media::resolve_video_url;
///
/// assert!(resolve_video_url(" https://youtu.be/abc123 ").is_some());
/// assert!(resolve_video_url("https://example.com/watch?v=abc123").is_none());
/// ```
pub fn resolve_video_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?.to_ascii_lowercase();
    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return None;
    }

    let path = parsed.path().trim_matches('/');
    if path.is_empty() {
        return None;
    }

    Some(parsed.to_string())
}
