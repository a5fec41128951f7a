//! Recommendation extraction for Tipster.
//!
//! Turns a transcript into a structured list of stock recommendations using
//! a generative model.

mod openai;

pub use openai::OpenAIExtractor;

use crate::error::{Result, TipsterError};
use crate::store::RecommendationEntry;
use crate::transcript::Transcript;
use async_trait::async_trait;
use serde::Deserialize;

/// Trait for recommendation extraction services.
#[async_trait]
pub trait RecommendationExtractor: Send + Sync {
    /// Extract recommendations from a transcript. An empty list is a valid
    /// answer; upstream or shape failures are `ExtractionFailed`.
    async fn extract(&self, transcript: &Transcript) -> Result<Vec<RecommendationEntry>>;
}

#[derive(Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    recommendations: Vec<RecommendationEntry>,
}

/// Parse a model response into recommendation entries.
///
/// Tolerates prose around the JSON object. A missing `recommendations` key
/// means none were found.
pub fn parse_recommendations(response: &str) -> Result<Vec<RecommendationEntry>> {
    let json_start = response.find('{');
    let json_end = response.rfind('}');

    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    let parsed: ExtractionResponse = serde_json::from_str(json_str).map_err(|e| {
        TipsterError::ExtractionFailed(format!(
            "Invalid recommendations JSON: {}. Response was: {}",
            e,
            preview(response, 500)
        ))
    })?;

    if let Some(bad) = parsed
        .recommendations
        .iter()
        .find(|r| !r.timestamp.is_finite() || r.timestamp < 0.0)
    {
        return Err(TipsterError::ExtractionFailed(format!(
            "Invalid timestamp {} for {}",
            bad.timestamp, bad.company_name
        )));
    }

    Ok(parsed.recommendations)
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
