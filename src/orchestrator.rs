//! Analysis orchestrator for Tipster.
//!
//! Coordinates one analysis from video reference to recommendations:
//! identity and quota checks, the recommendation cache, transcript
//! acquisition, extraction and usage accounting.

use crate::cache::{CacheLookup, CachePut, RecommendationCache};
use crate::config::{Prompts, Settings};
use crate::error::{Result, TipsterError};
use crate::extraction::{OpenAIExtractor, RecommendationExtractor};
use crate::store::{
    AnalysisRecord, NewUser, RecommendationEntry, RecommendationStore, SqliteStore, UserRecord,
    UserStore,
};
use crate::transcript::{HttpTranscriptService, TranscriptSource};
use crate::usage::{month_token, Tier, UsageLedger, UsagePolicy};
use crate::video_ref::extract_video_id;
use crate::youtube::{RecentVideo, VideoCatalog, YoutubeClient};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The main orchestrator for Tipster analyses.
pub struct Orchestrator {
    settings: Settings,
    users: Arc<dyn UserStore>,
    recommendations: Arc<dyn RecommendationStore>,
    cache: RecommendationCache,
    transcripts: Arc<dyn TranscriptSource>,
    extractor: Arc<dyn RecommendationExtractor>,
    videos: Option<Arc<dyn VideoCatalog>>,
    policy: UsagePolicy,
}

impl Orchestrator {
    /// Create an orchestrator wired to the configured services.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let store = Arc::new(SqliteStore::new(&settings.sqlite_path())?);
        let transcripts = Arc::new(HttpTranscriptService::new(&settings.transcript)?);
        let extractor = Arc::new(OpenAIExtractor::with_config(&settings.extraction)?.with_prompts(prompts));

        let videos: Option<Arc<dyn VideoCatalog>> = match YoutubeClient::new(&settings.youtube) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                debug!("Channel listing disabled: {}", e);
                None
            }
        };

        info!(
            "Using {} for extraction, transcripts from {}",
            settings.extraction.model, settings.transcript.base_url
        );

        Ok(Self::with_components(
            settings,
            store.clone(),
            store,
            transcripts,
            extractor,
            videos,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        users: Arc<dyn UserStore>,
        recommendations: Arc<dyn RecommendationStore>,
        transcripts: Arc<dyn TranscriptSource>,
        extractor: Arc<dyn RecommendationExtractor>,
        videos: Option<Arc<dyn VideoCatalog>>,
    ) -> Self {
        let policy = UsagePolicy::new(settings.usage.free_monthly_quota);
        let cache = RecommendationCache::new(recommendations.clone());

        Self {
            settings,
            users,
            recommendations,
            cache,
            transcripts,
            extractor,
            videos,
            policy,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn users(&self) -> Arc<dyn UserStore> {
        self.users.clone()
    }

    pub fn recommendations(&self) -> Arc<dyn RecommendationStore> {
        self.recommendations.clone()
    }

    pub fn policy(&self) -> UsagePolicy {
        self.policy
    }

    /// Analyze a video for the user identified by `identity`.
    pub async fn analyze(&self, reference: &str, identity: Option<&str>) -> Result<AnalysisOutcome> {
        self.analyze_at(reference, identity, Utc::now()).await
    }

    /// Analyze a video as of `now`.
    #[instrument(skip(self, identity), fields(reference = %reference))]
    pub async fn analyze_at(
        &self,
        reference: &str,
        identity: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AnalysisOutcome> {
        let email = identity
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(TipsterError::Unauthenticated)?;

        let video_id = extract_video_id(reference)?;

        let user = self
            .users
            .find_user(email)
            .await?
            .ok_or_else(|| TipsterError::UnknownUser(email.to_string()))?;

        if !self.policy.can_proceed(&user, now) {
            info!("Free-tier quota exhausted for {}", email);
            return Err(TipsterError::QuotaExceeded {
                limit: self.policy.free_quota(),
                month: month_token(now),
            });
        }

        let (recommendations, from_cache) = match self.cache.get(&video_id).await? {
            CacheLookup::Hit(set) => (set.recommendations, true),
            CacheLookup::Miss => (self.compute(&video_id, now).await?, false),
        };

        let usage = self.charge(&user, now).await?;

        let record = AnalysisRecord::new(&video_id, email, now, from_cache);
        if let Err(e) = self.recommendations.record_analysis(&record).await {
            warn!("Failed to record analysis of {} for history: {}", video_id, e);
        }

        info!(
            "Delivered {} recommendations for {}{}",
            recommendations.len(),
            video_id,
            if from_cache { " (cached)" } else { "" }
        );

        Ok(AnalysisOutcome {
            video_id,
            recommendations,
            from_cache,
            usage,
        })
    }

    /// Fetch, extract and cache recommendations for an uncached video.
    async fn compute(&self, video_id: &str, now: DateTime<Utc>) -> Result<Vec<RecommendationEntry>> {
        let transcript = self.transcripts.fetch_transcript(video_id).await?;
        let recommendations = self.extractor.extract(&transcript).await?;

        match self.cache.put_if_absent(video_id, &recommendations, now).await {
            Ok(CachePut::Stored) => debug!("Cached {} recommendations for {}", recommendations.len(), video_id),
            Ok(CachePut::AlreadyCached) => debug!("{} was cached concurrently, keeping existing set", video_id),
            Ok(CachePut::SkippedEmpty) => debug!("No recommendations for {}, not caching", video_id),
            Err(e) => warn!("Failed to cache recommendations for {}: {}", video_id, e),
        }

        Ok(recommendations)
    }

    /// Record one delivered analysis against a free-tier user's ledger.
    async fn charge(&self, user: &UserRecord, now: DateTime<Utc>) -> Result<Option<UsageLedger>> {
        if user.tier == Tier::Premium {
            return Ok(None);
        }

        let ledger = self
            .users
            .record_usage(&user.email, &month_token(now))
            .await
            .map_err(|e| match e {
                TipsterError::PersistenceFailed(_) => e,
                other => TipsterError::PersistenceFailed(format!("Failed to update usage: {}", other)),
            })?;

        Ok(Some(ledger))
    }

    /// Register a user on first login, returning the stored record.
    pub async fn register_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<UserRecord> {
        if user.email.trim().is_empty() {
            return Err(TipsterError::InvalidInput("email is required".to_string()));
        }
        if user.name.trim().is_empty() {
            return Err(TipsterError::InvalidInput("name is required".to_string()));
        }

        let user = NewUser {
            email: user.email.trim().to_string(),
            name: user.name.trim().to_string(),
            image: user.image.clone(),
        };
        self.users.create_user(&user, now).await
    }

    /// Change a user's subscription tier.
    pub async fn set_tier(&self, email: &str, tier: Tier) -> Result<()> {
        if self.users.set_tier(email, tier).await? {
            info!("{} is now on the {} tier", email, tier);
            Ok(())
        } else {
            Err(TipsterError::UnknownUser(email.to_string()))
        }
    }

    /// Recent long-form uploads on a channel.
    pub async fn recent_videos(&self, channel_id: &str, now: DateTime<Utc>) -> Result<Vec<RecentVideo>> {
        let catalog = self.videos.as_ref().ok_or_else(|| {
            TipsterError::Config("YouTube API key not set (youtube.api_key or YOUTUBE_API_KEY)".to_string())
        })?;
        catalog.recent_videos(channel_id, now).await
    }

    /// Analyze every recent upload on a channel, one at a time.
    ///
    /// Stops at the first quota failure; later videos are reported as skipped.
    #[instrument(skip(self, identity))]
    pub async fn analyze_channel(
        &self,
        channel_id: &str,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ChannelVideoReport>> {
        let videos = self.recent_videos(channel_id, now).await?;
        info!("Analyzing {} recent videos from {}", videos.len(), channel_id);

        let mut analyses = std::pin::pin!(stream::iter(videos.iter()).then(|video| async move {
            (video, self.analyze_at(&video.url, Some(identity), now).await)
        }));

        let mut reports = Vec::with_capacity(videos.len());
        while let Some((video, result)) = analyses.next().await {
            let quota_hit = matches!(&result, Err(e) if e.is_quota_exceeded());
            let status = match result {
                Ok(outcome) => ChannelVideoStatus::Analyzed(outcome),
                Err(e) => {
                    warn!("Analysis of {} failed: {}", video.video_id, e);
                    ChannelVideoStatus::Failed(e.to_string())
                }
            };
            reports.push(ChannelVideoReport {
                video: video.clone(),
                status,
            });
            if quota_hit {
                break;
            }
        }

        let skipped = videos[reports.len()..].to_vec();
        reports.extend(skipped.into_iter().map(|video| ChannelVideoReport {
            video,
            status: ChannelVideoStatus::Skipped,
        }));

        Ok(reports)
    }
}

/// Result of one delivered analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub video_id: String,
    pub recommendations: Vec<RecommendationEntry>,
    /// Whether the recommendations came from the cache.
    pub from_cache: bool,
    /// The user's ledger after this analysis; `None` for premium users.
    pub usage: Option<UsageLedger>,
}

/// Per-video result of a channel analysis.
#[derive(Debug, Clone)]
pub struct ChannelVideoReport {
    pub video: RecentVideo,
    pub status: ChannelVideoStatus,
}

#[derive(Debug, Clone)]
pub enum ChannelVideoStatus {
    Analyzed(AnalysisOutcome),
    Failed(String),
    /// Not attempted because the quota ran out.
    Skipped,
}
