//! SQLite-backed document store.
//!
//! Recommendation sets are kept as JSON documents keyed by video ID; ranking
//! and ticker lookups unpack them with SQLite's `json_each`.

use super::{
    AnalysisRecord, AnalyzedVideo, InsertOutcome, NewUser, RecommendationEntry, RecommendationSet,
    RecommendationStore, StockCount, StockVideo, UserRecord, UserStore,
};
use crate::error::{Result, TipsterError};
use crate::usage::{month_token, Tier, UsageLedger};
use crate::video_ref::watch_url;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    email TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    image TEXT,
    tier TEXT NOT NULL DEFAULT 'free',
    usage_month TEXT,
    usage_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recommendation_sets (
    video_id TEXT PRIMARY KEY,
    recommendations_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recommendation_sets_created_at ON recommendation_sets(created_at);

CREATE TABLE IF NOT EXISTS analyses (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL,
    email TEXT NOT NULL,
    analyzed_at TEXT NOT NULL,
    from_cache INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analyses_email ON analyses(email);
"#;

/// SQLite-backed user and recommendation store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets readers proceed while a handler writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TipsterError::PersistenceFailed(format!("Failed to acquire lock: {}", e)))
    }
}

fn format_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_entries(json: &str) -> rusqlite::Result<Vec<RecommendationEntry>> {
    serde_json::from_str(json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let tier: String = row.get(3)?;
    let usage_month: Option<String> = row.get(4)?;
    let usage_count: u32 = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(UserRecord {
        email: row.get(0)?,
        name: row.get(1)?,
        image: row.get(2)?,
        // Anything unrecognised is treated as the free tier.
        tier: tier.parse().unwrap_or_default(),
        usage: usage_month.map(|month| UsageLedger::new(month, usage_count)),
        created_at: parse_time(&created_at),
    })
}

fn set_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecommendationSet> {
    let json: String = row.get(1)?;
    let created_at: String = row.get(2)?;

    Ok(RecommendationSet {
        video_id: row.get(0)?,
        recommendations: parse_entries(&json)?,
        created_at: parse_time(&created_at),
    })
}

const SELECT_USER: &str =
    "SELECT email, name, image, tier, usage_month, usage_count, created_at FROM users WHERE email = ?1";

#[async_trait]
impl UserStore for SqliteStore {
    #[instrument(skip(self))]
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(SELECT_USER, params![email], user_from_row)
            .optional()?;
        Ok(user)
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<UserRecord> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO users (email, name, image, tier, usage_month, usage_count, created_at)
            VALUES (?1, ?2, ?3, 'free', ?4, 0, ?5)
            "#,
            params![
                user.email,
                user.name,
                user.image,
                month_token(now),
                format_time(&now),
            ],
        )?;

        if inserted > 0 {
            info!("Registered new user {}", user.email);
        }

        let record = conn.query_row(SELECT_USER, params![user.email], user_from_row)?;
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn set_tier(&self, email: &str, tier: Tier) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET tier = ?2 WHERE email = ?1",
            params![email, tier.to_string()],
        )?;
        Ok(updated > 0)
    }

    #[instrument(skip(self))]
    async fn record_usage(&self, email: &str, month: &str) -> Result<UsageLedger> {
        let conn = self.conn()?;

        // SET expressions see the pre-update row, so the CASE compares
        // against the stored month before it is overwritten.
        let ledger = conn
            .query_row(
                r#"
                UPDATE users SET
                    usage_count = CASE WHEN usage_month = ?2 THEN usage_count + 1 ELSE 1 END,
                    usage_month = ?2
                WHERE email = ?1
                RETURNING usage_month, usage_count
                "#,
                params![email, month],
                |row| Ok(UsageLedger::new(row.get::<_, String>(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| TipsterError::UnknownUser(email.to_string()))?;

        debug!("Usage for {} is now {} in {}", email, ledger.count, ledger.month);
        Ok(ledger)
    }
}

#[async_trait]
impl RecommendationStore for SqliteStore {
    #[instrument(skip(self))]
    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<RecommendationSet>> {
        let conn = self.conn()?;
        let set = conn
            .query_row(
                "SELECT video_id, recommendations_json, created_at FROM recommendation_sets WHERE video_id = ?1",
                params![video_id],
                set_from_row,
            )
            .optional()?;
        Ok(set)
    }

    #[instrument(skip(self, set), fields(video_id = %set.video_id))]
    async fn insert_if_absent(&self, set: &RecommendationSet) -> Result<InsertOutcome> {
        let conn = self.conn()?;
        let json = serde_json::to_string(&set.recommendations)?;

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO recommendation_sets (video_id, recommendations_json, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![set.video_id, json, format_time(&set.created_at)],
        )?;

        if inserted > 0 {
            info!("Cached {} recommendations for video {}", set.recommendations.len(), set.video_id);
            Ok(InsertOutcome::Inserted)
        } else {
            debug!("Recommendations for video {} already cached", set.video_id);
            Ok(InsertOutcome::AlreadyPresent)
        }
    }

    #[instrument(skip(self, record), fields(video_id = %record.video_id))]
    async fn record_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO analyses (id, video_id, email, analyzed_at, from_cache)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id.to_string(),
                record.video_id,
                record.email,
                format_time(&record.analyzed_at),
                record.from_cache,
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn history(&self, email: &str) -> Result<Vec<AnalyzedVideo>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT a.video_id, MAX(a.analyzed_at) AS last_analyzed_at, COUNT(*) AS analysis_count,
                   r.recommendations_json
            FROM analyses a
            LEFT JOIN recommendation_sets r ON r.video_id = a.video_id
            WHERE a.email = ?1
            GROUP BY a.video_id
            ORDER BY last_analyzed_at DESC
            "#,
        )?;

        let rows = stmt.query_map(params![email], |row| {
            let video_id: String = row.get(0)?;
            let last_analyzed_at: String = row.get(1)?;
            let json: Option<String> = row.get(3)?;

            Ok(AnalyzedVideo {
                url: watch_url(&video_id),
                video_id,
                recommendations: match json {
                    Some(json) => parse_entries(&json)?,
                    None => Vec::new(),
                },
                last_analyzed_at: parse_time(&last_analyzed_at),
                analysis_count: row.get(2)?,
            })
        })?;

        let videos = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Found {} analysed videos for {}", videos.len(), email);
        Ok(videos)
    }

    #[instrument(skip(self))]
    async fn videos_by_ticker(&self, query: &str) -> Result<Vec<StockVideo>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT video_id, recommendations_json, created_at
            FROM recommendation_sets
            WHERE EXISTS (
                SELECT 1 FROM json_each(recommendations_json) e
                WHERE instr(lower(json_extract(e.value, '$.ticker')), lower(?1)) > 0
            )
            ORDER BY created_at DESC
            "#,
        )?;

        let sets = stmt
            .query_map(params![query], set_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(sets
            .iter()
            .filter_map(|set| StockVideo::matching(set, query))
            .collect())
    }

    #[instrument(skip(self))]
    async fn top_stocks(&self, limit: usize) -> Result<Vec<StockCount>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT json_extract(e.value, '$.company_name') AS company_name,
                   json_extract(e.value, '$.ticker') AS ticker,
                   COUNT(DISTINCT r.video_id) AS videos
            FROM recommendation_sets r, json_each(r.recommendations_json) e
            GROUP BY company_name, ticker
            ORDER BY videos DESC, ticker ASC, company_name ASC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(StockCount {
                company_name: row.get(0)?,
                ticker: row.get(1)?,
                count: row.get(2)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn entry(company: &str, ticker: &str) -> RecommendationEntry {
        RecommendationEntry {
            company_name: company.to_string(),
            ticker: ticker.to_string(),
            timestamp: 42.0,
            reason: "Strong earnings".to_string(),
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Test User".to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();

        let first = store.create_user(&new_user("a@x.com"), at(2024, 1, 3)).await.unwrap();
        assert_eq!(first.tier, Tier::Free);
        assert_eq!(first.usage, Some(UsageLedger::new("2024-01", 0)));

        store.set_tier("a@x.com", Tier::Premium).await.unwrap();
        let again = store.create_user(&new_user("a@x.com"), at(2024, 3, 3)).await.unwrap();
        assert_eq!(again.tier, Tier::Premium);
        assert_eq!(again.created_at, first.created_at);

        assert!(store.find_user("nobody@x.com").await.unwrap().is_none());
        assert!(!store.set_tier("nobody@x.com", Tier::Premium).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_usage_increments_and_rolls_over() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_user(&new_user("a@x.com"), at(2024, 1, 3)).await.unwrap();

        assert_eq!(
            store.record_usage("a@x.com", "2024-01").await.unwrap(),
            UsageLedger::new("2024-01", 1)
        );
        assert_eq!(
            store.record_usage("a@x.com", "2024-01").await.unwrap(),
            UsageLedger::new("2024-01", 2)
        );
        assert_eq!(
            store.record_usage("a@x.com", "2024-02").await.unwrap(),
            UsageLedger::new("2024-02", 1)
        );

        let user = store.find_user("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.usage, Some(UsageLedger::new("2024-02", 1)));

        let err = store.record_usage("ghost@x.com", "2024-02").await.unwrap_err();
        assert!(matches!(err, TipsterError::UnknownUser(_)));
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first_write() {
        let store = SqliteStore::in_memory().unwrap();
        let first = RecommendationSet::new("v1".to_string(), vec![entry("Apple", "NASDAQ:AAPL")], at(2024, 1, 1));
        let second = RecommendationSet::new("v1".to_string(), vec![entry("Disney", "NYSE:DIS")], at(2024, 1, 2));

        assert_eq!(store.insert_if_absent(&first).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_if_absent(&second).await.unwrap(), InsertOutcome::AlreadyPresent);

        let stored = store.find_by_video_id("v1").await.unwrap().unwrap();
        assert_eq!(stored, first);
        assert!(store.find_by_video_id("v2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_groups_by_video() {
        let store = SqliteStore::in_memory().unwrap();
        let set = RecommendationSet::new("v1".to_string(), vec![entry("Apple", "NASDAQ:AAPL")], at(2024, 1, 1));
        store.insert_if_absent(&set).await.unwrap();

        store.record_analysis(&AnalysisRecord::new("v1", "a@x.com", at(2024, 1, 2), false)).await.unwrap();
        store.record_analysis(&AnalysisRecord::new("v2", "a@x.com", at(2024, 1, 3), false)).await.unwrap();
        store.record_analysis(&AnalysisRecord::new("v1", "a@x.com", at(2024, 1, 4), true)).await.unwrap();
        store.record_analysis(&AnalysisRecord::new("v1", "b@x.com", at(2024, 1, 5), true)).await.unwrap();

        let history = store.history("a@x.com").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].video_id, "v1");
        assert_eq!(history[0].analysis_count, 2);
        assert_eq!(history[0].last_analyzed_at, at(2024, 1, 4));
        assert_eq!(history[0].recommendations.len(), 1);
        assert_eq!(history[1].video_id, "v2");
        assert!(history[1].recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_ticker_queries() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_if_absent(&RecommendationSet::new(
                "v1".to_string(),
                vec![entry("Apple", "NASDAQ:AAPL"), entry("Apple", "NASDAQ:AAPL"), entry("Disney", "NYSE:DIS")],
                at(2024, 1, 1),
            ))
            .await
            .unwrap();
        store
            .insert_if_absent(&RecommendationSet::new(
                "v2".to_string(),
                vec![entry("Apple", "NASDAQ:AAPL")],
                at(2024, 1, 2),
            ))
            .await
            .unwrap();

        let top = store.top_stocks(10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].ticker, "NASDAQ:AAPL");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].count, 1);

        let videos = store.videos_by_ticker("aapl").await.unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].video_id, "v2");
        assert_eq!(videos[1].recommendations.len(), 2);

        assert!(store.videos_by_ticker("TSLA").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tipster.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.create_user(&new_user("a@x.com"), at(2024, 1, 3)).await.unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert!(reopened.find_user("a@x.com").await.unwrap().is_some());
    }
}
