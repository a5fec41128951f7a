//! Transcript acquisition for Tipster.
//!
//! Transcripts come from an external service; this module defines the
//! time-coded text model and the trait the orchestrator depends on.

mod http;

pub use http::HttpTranscriptService;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A time-coded transcript of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Video ID this transcript belongs to.
    pub video_id: String,
    /// Transcript segments in playback order.
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(video_id: String, segments: Vec<TranscriptSegment>) -> Self {
        Self { video_id, segments }
    }

    /// A transcript delivered as one untimed block of text.
    pub fn from_text(video_id: String, text: String) -> Self {
        Self::new(video_id, vec![TranscriptSegment::new(0.0, 0.0, text)])
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.text.trim().is_empty())
    }

    /// One line per segment, prefixed with its offset in whole seconds: `[12s] text`.
    pub fn format_with_timestamps(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("[{:.0}s] {}", s.offset_seconds, s.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start offset in seconds.
    pub offset_seconds: f64,
    /// Duration in seconds (0 when unknown).
    pub duration_seconds: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(offset_seconds: f64, duration_seconds: f64, text: String) -> Self {
        Self {
            offset_seconds,
            duration_seconds,
            text,
        }
    }
}

/// Source of video transcripts.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the transcript for a video. Every failure is `TranscriptUnavailable`.
    async fn fetch_transcript(&self, video_id: &str) -> Result<Transcript>;
}
