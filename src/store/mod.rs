//! Document store abstraction for Tipster.
//!
//! Provides trait-based interfaces over the two collections the core relies
//! on: user records (with their usage ledgers) and recommendation sets keyed
//! by video identifier.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::usage::{Tier, UsageLedger};
use crate::video_ref::watch_url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique identity (the login email).
    pub email: String,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub image: Option<String>,
    /// Subscription tier.
    pub tier: Tier,
    /// Monthly analysis ledger.
    pub usage: Option<UsageLedger>,
    /// When the user first logged in.
    pub created_at: DateTime<Utc>,
}

/// Data supplied on first login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// One stock mention extracted from a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    /// Full company name.
    pub company_name: String,
    /// Ticker, usually `EXCHANGE:SYMBOL`.
    pub ticker: String,
    /// Seconds into the video where the company is first mentioned.
    pub timestamp: f64,
    /// Why the speaker recommends it.
    pub reason: String,
}

/// The recommendations extracted for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub video_id: String,
    pub recommendations: Vec<RecommendationEntry>,
    pub created_at: DateTime<Utc>,
}

impl RecommendationSet {
    pub fn new(video_id: String, recommendations: Vec<RecommendationEntry>, created_at: DateTime<Utc>) -> Self {
        Self {
            video_id,
            recommendations,
            created_at,
        }
    }
}

/// Result of an insert-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call created the record.
    Inserted,
    /// A record for the key already existed and was left untouched.
    AlreadyPresent,
}

/// One delivered analysis, kept for the user's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub video_id: String,
    pub email: String,
    pub analyzed_at: DateTime<Utc>,
    /// Whether the result came from the recommendation cache.
    pub from_cache: bool,
}

impl AnalysisRecord {
    pub fn new(video_id: &str, email: &str, analyzed_at: DateTime<Utc>, from_cache: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id: video_id.to_string(),
            email: email.to_string(),
            analyzed_at,
            from_cache,
        }
    }
}

/// A video in a user's analysis history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedVideo {
    pub video_id: String,
    pub url: String,
    /// Cached recommendations; empty when the video yielded none.
    pub recommendations: Vec<RecommendationEntry>,
    pub last_analyzed_at: DateTime<Utc>,
    pub analysis_count: u32,
}

/// A mention of a specific stock inside one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMention {
    pub company_name: String,
    pub reason: String,
    pub timestamp: f64,
}

/// A video recommending a given stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockVideo {
    pub video_id: String,
    pub url: String,
    pub recommendations: Vec<StockMention>,
    pub created_at: DateTime<Utc>,
}

impl StockVideo {
    /// Mentions in `set` whose ticker contains `query` (case-insensitive).
    pub fn matching(set: &RecommendationSet, query: &str) -> Option<Self> {
        let needle = query.to_lowercase();
        let recommendations: Vec<StockMention> = set
            .recommendations
            .iter()
            .filter(|r| r.ticker.to_lowercase().contains(&needle))
            .map(|r| StockMention {
                company_name: r.company_name.clone(),
                reason: r.reason.clone(),
                timestamp: r.timestamp,
            })
            .collect();

        if recommendations.is_empty() {
            return None;
        }

        Some(Self {
            video_id: set.video_id.clone(),
            url: watch_url(&set.video_id),
            recommendations,
            created_at: set.created_at,
        })
    }
}

/// How many distinct videos recommend a stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCount {
    pub company_name: String,
    pub ticker: String,
    pub count: u32,
}

/// Rank stocks by the number of distinct videos recommending them.
pub fn rank_stocks<'a>(sets: impl IntoIterator<Item = &'a RecommendationSet>, limit: usize) -> Vec<StockCount> {
    let mut videos: HashMap<(String, String), BTreeSet<&str>> = HashMap::new();
    for set in sets {
        for rec in &set.recommendations {
            videos
                .entry((rec.company_name.clone(), rec.ticker.clone()))
                .or_default()
                .insert(set.video_id.as_str());
        }
    }

    let mut ranked: Vec<StockCount> = videos
        .into_iter()
        .map(|((company_name, ticker), ids)| StockCount {
            company_name,
            ticker,
            count: ids.len() as u32,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.ticker.cmp(&b.ticker))
            .then_with(|| a.company_name.cmp(&b.company_name))
    });
    ranked.truncate(limit);
    ranked
}

/// Store of user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by identity.
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Return the existing user, or register a new free-tier one.
    async fn create_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<UserRecord>;

    /// Change a user's subscription tier. Returns false for unknown users.
    async fn set_tier(&self, email: &str, tier: Tier) -> Result<bool>;

    /// Record one analysis in `month` as a single atomic read-modify-write.
    ///
    /// A ledger for another month is replaced by `{month, 1}`; a ledger for
    /// `month` is incremented. Fails with `UnknownUser` if the user is gone.
    async fn record_usage(&self, email: &str, month: &str) -> Result<UsageLedger>;
}

/// Store of recommendation sets and analysis history.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Fetch the recommendation set for a video.
    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<RecommendationSet>>;

    /// Insert the set unless one already exists for its video.
    async fn insert_if_absent(&self, set: &RecommendationSet) -> Result<InsertOutcome>;

    /// Append an analysis to the user's history.
    async fn record_analysis(&self, record: &AnalysisRecord) -> Result<()>;

    /// Videos analysed by a user, most recently analysed first.
    async fn history(&self, email: &str) -> Result<Vec<AnalyzedVideo>>;

    /// Cached videos recommending a ticker matching `query`, newest first.
    async fn videos_by_ticker(&self, query: &str) -> Result<Vec<StockVideo>>;

    /// Most recommended stocks across all cached videos.
    async fn top_stocks(&self, limit: usize) -> Result<Vec<StockCount>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(company: &str, ticker: &str, ts: f64) -> RecommendationEntry {
        RecommendationEntry {
            company_name: company.to_string(),
            ticker: ticker.to_string(),
            timestamp: ts,
            reason: format!("{} looks cheap", company),
        }
    }

    fn set(video_id: &str, entries: Vec<RecommendationEntry>) -> RecommendationSet {
        RecommendationSet::new(
            video_id.to_string(),
            entries,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_rank_counts_distinct_videos() {
        let sets = vec![
            set(
                "v1",
                vec![
                    entry("Apple", "NASDAQ:AAPL", 10.0),
                    entry("Apple", "NASDAQ:AAPL", 90.0),
                    entry("Disney", "NYSE:DIS", 30.0),
                ],
            ),
            set("v2", vec![entry("Apple", "NASDAQ:AAPL", 5.0)]),
            set("v3", vec![entry("Nvidia", "NASDAQ:NVDA", 5.0)]),
        ];

        let ranked = rank_stocks(&sets, 10);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].ticker, "NASDAQ:AAPL");
        assert_eq!(ranked[0].count, 2);
        // Ties are ordered by ticker.
        assert_eq!(ranked[1].ticker, "NASDAQ:NVDA");
        assert_eq!(ranked[2].ticker, "NYSE:DIS");

        assert_eq!(rank_stocks(&sets, 1).len(), 1);
    }

    #[test]
    fn test_stock_video_matching() {
        let s = set(
            "v1",
            vec![entry("Apple", "NASDAQ:AAPL", 10.0), entry("Disney", "NYSE:DIS", 30.0)],
        );

        let matched = StockVideo::matching(&s, "aapl").unwrap();
        assert_eq!(matched.recommendations.len(), 1);
        assert_eq!(matched.recommendations[0].company_name, "Apple");
        assert_eq!(matched.url, "https://www.youtube.com/watch?v=v1");

        assert!(StockVideo::matching(&s, "TSLA").is_none());
    }
}
