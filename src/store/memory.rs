//! In-memory store implementation.
//!
//! Useful for testing and for running the API without a database file.

use super::{
    rank_stocks, AnalysisRecord, AnalyzedVideo, InsertOutcome, NewUser, RecommendationSet,
    RecommendationStore, StockCount, StockVideo, UserRecord, UserStore,
};
use crate::error::{Result, TipsterError};
use crate::usage::{month_token, Tier, UsageLedger};
use crate::video_ref::watch_url;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory user and recommendation store.
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    sets: RwLock<HashMap<String, RecommendationSet>>,
    analyses: RwLock<Vec<AnalysisRecord>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sets: RwLock::new(HashMap::new()),
            analyses: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace a user record as-is.
    pub fn put_user(&self, user: UserRecord) -> Result<()> {
        self.users
            .write()
            .map_err(lock_error)?
            .insert(user.email.clone(), user);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_error<T>(e: PoisonError<T>) -> TipsterError {
    TipsterError::PersistenceFailed(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read().map_err(lock_error)?;
        Ok(users.get(email).cloned())
    }

    async fn create_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<UserRecord> {
        let mut users = self.users.write().map_err(lock_error)?;
        let record = users.entry(user.email.clone()).or_insert_with(|| UserRecord {
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
            tier: Tier::Free,
            usage: Some(UsageLedger::new(month_token(now), 0)),
            created_at: now,
        });
        Ok(record.clone())
    }

    async fn set_tier(&self, email: &str, tier: Tier) -> Result<bool> {
        let mut users = self.users.write().map_err(lock_error)?;
        match users.get_mut(email) {
            Some(user) => {
                user.tier = tier;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_usage(&self, email: &str, month: &str) -> Result<UsageLedger> {
        // Holding the write lock makes the read-modify-write atomic.
        let mut users = self.users.write().map_err(lock_error)?;
        let user = users
            .get_mut(email)
            .ok_or_else(|| TipsterError::UnknownUser(email.to_string()))?;

        let ledger = UsageLedger::advanced(user.usage.as_ref(), month);
        user.usage = Some(ledger.clone());
        Ok(ledger)
    }
}

#[async_trait]
impl RecommendationStore for MemoryStore {
    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<RecommendationSet>> {
        let sets = self.sets.read().map_err(lock_error)?;
        Ok(sets.get(video_id).cloned())
    }

    async fn insert_if_absent(&self, set: &RecommendationSet) -> Result<InsertOutcome> {
        let mut sets = self.sets.write().map_err(lock_error)?;
        if sets.contains_key(&set.video_id) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        sets.insert(set.video_id.clone(), set.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn record_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        self.analyses.write().map_err(lock_error)?.push(record.clone());
        Ok(())
    }

    async fn history(&self, email: &str) -> Result<Vec<AnalyzedVideo>> {
        let analyses = self.analyses.read().map_err(lock_error)?;
        let sets = self.sets.read().map_err(lock_error)?;

        let mut by_video: HashMap<&str, (DateTime<Utc>, u32)> = HashMap::new();
        for record in analyses.iter().filter(|a| a.email == email) {
            let slot = by_video
                .entry(record.video_id.as_str())
                .or_insert((record.analyzed_at, 0));
            slot.0 = slot.0.max(record.analyzed_at);
            slot.1 += 1;
        }

        let mut videos: Vec<AnalyzedVideo> = by_video
            .into_iter()
            .map(|(video_id, (last_analyzed_at, analysis_count))| AnalyzedVideo {
                video_id: video_id.to_string(),
                url: watch_url(video_id),
                recommendations: sets
                    .get(video_id)
                    .map(|s| s.recommendations.clone())
                    .unwrap_or_default(),
                last_analyzed_at,
                analysis_count,
            })
            .collect();

        videos.sort_by(|a, b| b.last_analyzed_at.cmp(&a.last_analyzed_at));
        Ok(videos)
    }

    async fn videos_by_ticker(&self, query: &str) -> Result<Vec<StockVideo>> {
        let sets = self.sets.read().map_err(lock_error)?;
        let mut videos: Vec<StockVideo> = sets
            .values()
            .filter_map(|set| StockVideo::matching(set, query))
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn top_stocks(&self, limit: usize) -> Result<Vec<StockCount>> {
        let sets = self.sets.read().map_err(lock_error)?;
        Ok(rank_stocks(sets.values(), limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecommendationEntry;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_record_usage_rollover() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        store
            .create_user(
                &NewUser {
                    email: "a@x.com".to_string(),
                    name: "A".to_string(),
                    image: None,
                },
                now,
            )
            .await
            .unwrap();

        let ledger = store.record_usage("a@x.com", "2024-01").await.unwrap();
        assert_eq!(ledger, UsageLedger::new("2024-01", 1));
        let ledger = store.record_usage("a@x.com", "2024-02").await.unwrap();
        assert_eq!(ledger, UsageLedger::new("2024-02", 1));
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let set = RecommendationSet::new(
            "v1".to_string(),
            vec![RecommendationEntry {
                company_name: "Apple".to_string(),
                ticker: "NASDAQ:AAPL".to_string(),
                timestamp: 1.0,
                reason: "iPhone".to_string(),
            }],
            now,
        );

        assert_eq!(store.insert_if_absent(&set).await.unwrap(), InsertOutcome::Inserted);
        let mut other = set.clone();
        other.recommendations.clear();
        assert_eq!(store.insert_if_absent(&other).await.unwrap(), InsertOutcome::AlreadyPresent);
        assert_eq!(store.find_by_video_id("v1").await.unwrap().unwrap(), set);
    }
}
