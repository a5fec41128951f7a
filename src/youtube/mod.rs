//! YouTube Data API client.
//!
//! Lists a channel's recent long-form uploads: videos published inside the
//! configured window, with shorts filtered out by duration.

use crate::config::YoutubeSettings;
use crate::error::{Result, TipsterError};
use crate::video_ref::watch_url;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, instrument};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("valid duration regex")
});

/// A recent upload on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentVideo {
    pub video_id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// Source of channel upload listings.
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Recent long-form videos on a channel, newest first.
    async fn recent_videos(&self, channel_id: &str, now: DateTime<Utc>) -> Result<Vec<RecentVideo>>;
}

/// Parse an ISO-8601 duration such as `PT1H2M3S` into seconds.
///
/// Anything unparsable counts as zero seconds.
pub fn parse_iso8601_duration(duration: &str) -> u64 {
    let Some(caps) = DURATION_RE.captures(duration.trim()) else {
        return 0;
    };

    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    part(1)
        .saturating_mul(3600)
        .saturating_add(part(2).saturating_mul(60))
        .saturating_add(part(3))
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: Option<ContentDetails>,
}

#[derive(Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// IDs of search results published within `window_days` of `now`.
fn select_recent(items: &[SearchItem], now: DateTime<Utc>, window_days: u32) -> Vec<String> {
    let cutoff = now - Duration::days(i64::from(window_days));
    items
        .iter()
        .filter(|item| item.snippet.published_at >= cutoff)
        .filter_map(|item| item.id.video_id.clone())
        .collect()
}

/// Drop shorts and order newest first.
fn build_videos(items: Vec<VideoItem>, min_duration_seconds: u64) -> Vec<RecentVideo> {
    let mut videos: Vec<RecentVideo> = items
        .into_iter()
        .filter(|v| {
            let seconds = v
                .content_details
                .as_ref()
                .map(|d| parse_iso8601_duration(&d.duration))
                .unwrap_or(0);
            seconds >= min_duration_seconds
        })
        .map(|v| RecentVideo {
            url: watch_url(&v.id),
            thumbnail: v
                .snippet
                .thumbnails
                .high
                .or(v.snippet.thumbnails.default)
                .map(|t| t.url),
            title: v.snippet.title,
            published_at: v.snippet.published_at,
            video_id: v.id,
        })
        .collect();

    videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    videos
}

/// YouTube Data API v3 client.
pub struct YoutubeClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    settings: YoutubeSettings,
}

impl YoutubeClient {
    /// Create a client; fails when no API key is configured.
    pub fn new(settings: &YoutubeSettings) -> Result<Self> {
        let api_key = settings.resolved_api_key().ok_or_else(|| {
            TipsterError::Config("YouTube API key not set (youtube.api_key or YOUTUBE_API_KEY)".to_string())
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            api_base: API_BASE.to_string(),
            settings: settings.clone(),
        })
    }

    /// Point the client at a different API base (for proxies and tests).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<ListResponse<T>> {
        let response = self
            .client
            .get(format!("{}/{}", self.api_base, endpoint))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| TipsterError::VideoPlatform(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TipsterError::VideoPlatform(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("YouTube API returned {}", status));
            return Err(TipsterError::VideoPlatform(message));
        }

        serde_json::from_str(&body)
            .map_err(|e| TipsterError::VideoPlatform(format!("Unexpected {} response: {}", endpoint, e)))
    }
}

#[async_trait]
impl VideoCatalog for YoutubeClient {
    #[instrument(skip(self))]
    async fn recent_videos(&self, channel_id: &str, now: DateTime<Utc>) -> Result<Vec<RecentVideo>> {
        let max_results = self.settings.max_results.to_string();
        let search: ListResponse<SearchItem> = self
            .get(
                "search",
                &[
                    ("part", "snippet"),
                    ("channelId", channel_id),
                    ("maxResults", &max_results),
                    ("order", "date"),
                    ("type", "video"),
                ],
            )
            .await?;

        if search.items.is_empty() {
            return Err(TipsterError::VideoPlatform("No recent videos found".to_string()));
        }

        let ids = select_recent(&search.items, now, self.settings.recent_window_days);
        if ids.is_empty() {
            debug!("No uploads on {} within {} days", channel_id, self.settings.recent_window_days);
            return Ok(Vec::new());
        }

        let joined = ids.join(",");
        let details: ListResponse<VideoItem> = self
            .get("videos", &[("part", "contentDetails,snippet"), ("id", &joined)])
            .await?;

        let videos = build_videos(details.items, self.settings.min_duration_seconds);
        debug!("{} recent long-form videos on {}", videos.len(), channel_id);
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration("PT59S"), 59);
        assert_eq!(parse_iso8601_duration("PT10M"), 600);
        assert_eq!(parse_iso8601_duration("PT2H"), 7200);
        assert_eq!(parse_iso8601_duration("P1D"), 0);
        assert_eq!(parse_iso8601_duration("garbage"), 0);
    }

    #[test]
    fn test_select_recent_applies_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        let items: Vec<SearchItem> = serde_json::from_str(
            r#"[
                {"id": {"videoId": "new"}, "snippet": {"title": "New", "publishedAt": "2024-03-19T10:00:00Z"}},
                {"id": {"videoId": "edge"}, "snippet": {"title": "Edge", "publishedAt": "2024-03-05T00:00:00Z"}},
                {"id": {"videoId": "old"}, "snippet": {"title": "Old", "publishedAt": "2024-02-01T00:00:00Z"}},
                {"id": {}, "snippet": {"title": "Playlist", "publishedAt": "2024-03-19T00:00:00Z"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(select_recent(&items, now, 15), vec!["new", "edge"]);
    }

    #[test]
    fn test_build_videos_drops_shorts_and_sorts() {
        let items: Vec<VideoItem> = serde_json::from_str(
            r#"[
                {"id": "a", "snippet": {"title": "A", "publishedAt": "2024-03-10T00:00:00Z",
                  "thumbnails": {"high": {"url": "https://i.ytimg.com/a.jpg"}}},
                 "contentDetails": {"duration": "PT12M"}},
                {"id": "short", "snippet": {"title": "Short", "publishedAt": "2024-03-18T00:00:00Z"},
                 "contentDetails": {"duration": "PT45S"}},
                {"id": "b", "snippet": {"title": "B", "publishedAt": "2024-03-15T00:00:00Z"},
                 "contentDetails": {"duration": "PT1M"}}
            ]"#,
        )
        .unwrap();

        let videos = build_videos(items, 60);
        let ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(videos[1].thumbnail.as_deref(), Some("https://i.ytimg.com/a.jpg"));
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=b");
    }

    #[test]
    fn test_parse_duration_saturates() {
        assert_eq!(parse_iso8601_duration("PT99999999999999999H"), u64::MAX);
        assert_eq!(parse_iso8601_duration("PT5124095576030431H16S"), u64::MAX);
    }

    #[test]
    fn test_new_requires_api_key() {
        std::env::remove_var("YOUTUBE_API_KEY");

        let blank = YoutubeSettings {
            api_key: Some(String::new()),
            ..YoutubeSettings::default()
        };
        assert!(matches!(YoutubeClient::new(&blank), Err(TipsterError::Config(_))));

        let configured = YoutubeSettings {
            api_key: Some("k".to_string()),
            ..YoutubeSettings::default()
        };
        assert!(YoutubeClient::new(&configured).is_ok());
    }

    async fn fake_search(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        if params.get("key").map(String::as_str) != Some("test-key")
            || params.get("order").map(String::as_str) != Some("date")
            || params.get("type").map(String::as_str) != Some("video")
        {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "bad search query"}})));
        }

        match params.get("channelId").map(String::as_str) {
            Some("UCempty") => (StatusCode::OK, Json(json!({"items": []}))),
            Some("UCdenied") => (
                StatusCode::FORBIDDEN,
                Json(json!({"error": {"message": "The request cannot be completed because you have exceeded your quota."}})),
            ),
            _ => (
                StatusCode::OK,
                Json(json!({"items": [
                    {"id": {"videoId": "new"}, "snippet": {"title": "New", "publishedAt": "2024-03-19T10:00:00Z"}},
                    {"id": {"videoId": "short"}, "snippet": {"title": "Short", "publishedAt": "2024-03-18T00:00:00Z"}},
                    {"id": {"videoId": "older"}, "snippet": {"title": "Older", "publishedAt": "2024-03-10T00:00:00Z"}},
                    {"id": {"videoId": "stale"}, "snippet": {"title": "Stale", "publishedAt": "2024-01-01T00:00:00Z"}}
                ]})),
            ),
        }
    }

    async fn fake_videos(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        if params.get("part").map(String::as_str) != Some("contentDetails,snippet") {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "bad videos query"}})));
        }

        let catalog = json!({
            "new": {"id": "new", "snippet": {"title": "New", "publishedAt": "2024-03-19T10:00:00Z"},
                    "contentDetails": {"duration": "PT15M2S"}},
            "short": {"id": "short", "snippet": {"title": "Short", "publishedAt": "2024-03-18T00:00:00Z"},
                      "contentDetails": {"duration": "PT40S"}},
            "older": {"id": "older", "snippet": {"title": "Older", "publishedAt": "2024-03-10T00:00:00Z"},
                      "contentDetails": {"duration": "PT1H"}},
            "stale": {"id": "stale", "snippet": {"title": "Stale", "publishedAt": "2024-01-01T00:00:00Z"},
                      "contentDetails": {"duration": "PT30M"}}
        });
        let items: Vec<Value> = params
            .get("id")
            .map(|ids| ids.split(',').filter_map(|id| catalog.get(id).cloned()).collect())
            .unwrap_or_default();

        (StatusCode::OK, Json(json!({ "items": items })))
    }

    async fn local_client() -> YoutubeClient {
        let app = Router::new()
            .route("/search", get(fake_search))
            .route("/videos", get(fake_videos));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let settings = YoutubeSettings {
            api_key: Some("test-key".to_string()),
            ..YoutubeSettings::default()
        };
        YoutubeClient::new(&settings)
            .unwrap()
            .with_api_base(&format!("http://{}/", addr))
    }

    #[tokio::test]
    async fn test_recent_videos_over_http() {
        let client = local_client().await;
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();

        let videos = client.recent_videos("UCgood", now).await.unwrap();
        let ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "older"]);
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=new");

        let err = client.recent_videos("UCempty", now).await.unwrap_err();
        assert!(matches!(&err, TipsterError::VideoPlatform(m) if m == "No recent videos found"));

        let err = client.recent_videos("UCdenied", now).await.unwrap_err();
        assert!(matches!(&err, TipsterError::VideoPlatform(m) if m.contains("exceeded your quota")));
    }
}
