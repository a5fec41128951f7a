//! Video reference parsing.
//!
//! Turns a user-supplied YouTube URL into the canonical video identifier.

use crate::error::{Result, TipsterError};
use url::Url;

/// Hosts serving the canonical watch page (`/watch?v=ID`).
const WATCH_HOSTS: &[&str] = &["youtube.com", "www.youtube.com"];

/// Host serving short links (`/ID`).
const SHORT_LINK_HOST: &str = "youtu.be";

/// Extract the video identifier from a YouTube URL.
///
/// Accepts `https://[www.]youtube.com/watch?v=ID` and `https://youtu.be/ID`.
/// Any other host, an unparsable URL, or an empty identifier is an
/// [`TipsterError::InvalidVideoReference`].
pub fn extract_video_id(reference: &str) -> Result<String> {
    let url = Url::parse(reference.trim())
        .map_err(|e| TipsterError::InvalidVideoReference(format!("{}: {}", reference, e)))?;

    let host = url.host_str().unwrap_or_default();

    let id = if WATCH_HOSTS.contains(&host) {
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    } else if host == SHORT_LINK_HOST {
        url.path_segments()
            .and_then(|mut segments| segments.next())
            .map(|segment| segment.to_string())
    } else {
        return Err(TipsterError::InvalidVideoReference(format!(
            "Unsupported host '{}' in {}",
            host, reference
        )));
    };

    match id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(TipsterError::InvalidVideoReference(format!(
            "Unable to extract video ID from {}",
            reference
        ))),
    }
}

/// Canonical watch URL for a video identifier.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_link() {
        assert_eq!(extract_video_id("https://youtu.be/abc123").unwrap(), "abc123");
        assert_eq!(extract_video_id("https://youtu.be/abc123?t=42").unwrap(), "abc123");
        assert_eq!(extract_video_id("https://youtu.be/abc123/extra").unwrap(), "abc123");
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=xyz789&t=5").unwrap(),
            "xyz789"
        );
        assert_eq!(
            extract_video_id("https://youtube.com/watch?t=5&v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("  https://www.youtube.com/watch?v=xyz789  ").unwrap(),
            "xyz789"
        );
    }

    #[test]
    fn test_rejects_other_hosts() {
        let err = extract_video_id("https://vimeo.com/12345").unwrap_err();
        assert!(matches!(err, TipsterError::InvalidVideoReference(_)));

        // Only the exact hosts are accepted.
        assert!(extract_video_id("https://m.youtube.com/watch?v=abc").is_err());
        assert!(extract_video_id("https://notyoutube.com/watch?v=abc").is_err());
    }

    #[test]
    fn test_rejects_malformed_or_missing_id() {
        assert!(extract_video_id("not a url").is_err());
        assert!(extract_video_id("").is_err());
        assert!(extract_video_id("https://www.youtube.com/watch").is_err());
        assert!(extract_video_id("https://www.youtube.com/watch?v=").is_err());
        assert!(extract_video_id("https://youtu.be/").is_err());
    }

    #[test]
    fn test_watch_url_roundtrip() {
        assert_eq!(extract_video_id(&watch_url("abc123")).unwrap(), "abc123");
    }
}
