//! HTTP client for the transcript service.
//!
//! The service answers `GET {base_url}/transcript/{video_id}` with
//! `{"transcript": ...}` on success and `{"error": "..."}` otherwise. The
//! transcript is either a list of timed segments or a single string.

use super::{Transcript, TranscriptSegment, TranscriptSource};
use crate::config::TranscriptSettings;
use crate::error::{Result, TipsterError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Transcript service reached over HTTP.
pub struct HttpTranscriptService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranscriptService {
    pub fn new(settings: &TranscriptSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| TipsterError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn transcript_url(&self, video_id: &str) -> String {
        format!("{}/transcript/{}", self.base_url, video_id)
    }
}

#[derive(Deserialize)]
struct TranscriptResponse {
    transcript: TranscriptPayload,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptPayload {
    Segments(Vec<RawSegment>),
    Text(String),
}

#[derive(Deserialize)]
struct RawSegment {
    text: String,
    #[serde(alias = "offset", default)]
    start: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

/// Parse a successful response body into a transcript.
fn parse_transcript(video_id: &str, body: &str) -> Result<Transcript> {
    let response: TranscriptResponse = serde_json::from_str(body)
        .map_err(|e| TipsterError::TranscriptUnavailable(format!("Malformed transcript response: {}", e)))?;

    let transcript = match response.transcript {
        TranscriptPayload::Segments(segments) => Transcript::new(
            video_id.to_string(),
            segments
                .into_iter()
                .map(|s| TranscriptSegment::new(s.start, s.duration, s.text))
                .collect(),
        ),
        TranscriptPayload::Text(text) => Transcript::from_text(video_id.to_string(), text),
    };

    if transcript.is_empty() {
        return Err(TipsterError::TranscriptUnavailable(format!(
            "Transcript for {} is empty",
            video_id
        )));
    }

    Ok(transcript)
}

/// Best-effort error message from a failed response body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| format!("Transcript service returned {}", status))
}

#[async_trait]
impl TranscriptSource for HttpTranscriptService {
    #[instrument(skip(self))]
    async fn fetch_transcript(&self, video_id: &str) -> Result<Transcript> {
        let response = self
            .client
            .get(self.transcript_url(video_id))
            .send()
            .await
            .map_err(|e| TipsterError::TranscriptUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TipsterError::TranscriptUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(TipsterError::TranscriptUnavailable(error_message(status, &body)));
        }

        let transcript = parse_transcript(video_id, &body)?;
        debug!("Fetched {} transcript segments for {}", transcript.segments.len(), video_id);
        Ok(transcript)
    }
}
