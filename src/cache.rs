//! Recommendation cache keyed by video identifier.
//!
//! A recommendation set is written at most once per video and then only read.
//! Empty results are never stored so the video is re-analysed next time.

use crate::error::Result;
use crate::store::{InsertOutcome, RecommendationEntry, RecommendationSet, RecommendationStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(RecommendationSet),
    Miss,
}

/// Outcome of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePut {
    /// The set is now the authoritative record for the video.
    Stored,
    /// Another writer got there first; its record stays authoritative.
    AlreadyCached,
    /// Nothing to store for an empty result.
    SkippedEmpty,
}

/// Get / put-if-absent view over a [`RecommendationStore`].
#[derive(Clone)]
pub struct RecommendationCache {
    store: Arc<dyn RecommendationStore>,
}

impl RecommendationCache {
    pub fn new(store: Arc<dyn RecommendationStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, video_id: &str) -> Result<CacheLookup> {
        match self.store.find_by_video_id(video_id).await? {
            Some(set) => {
                debug!("Cache hit for video {}", video_id);
                Ok(CacheLookup::Hit(set))
            }
            None => {
                debug!("Cache miss for video {}", video_id);
                Ok(CacheLookup::Miss)
            }
        }
    }

    /// Store `recommendations` for `video_id` unless empty or already cached.
    pub async fn put_if_absent(
        &self,
        video_id: &str,
        recommendations: &[RecommendationEntry],
        now: DateTime<Utc>,
    ) -> Result<CachePut> {
        if recommendations.is_empty() {
            return Ok(CachePut::SkippedEmpty);
        }

        let set = RecommendationSet::new(video_id.to_string(), recommendations.to_vec(), now);
        match self.store.insert_if_absent(&set).await? {
            InsertOutcome::Inserted => Ok(CachePut::Stored),
            InsertOutcome::AlreadyPresent => Ok(CachePut::AlreadyCached),
        }
    }
}
