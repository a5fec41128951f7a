//! Tipster - stock recommendations from YouTube videos
//!
//! Tipster reads a video's transcript, asks a language model which stocks the
//! speaker recommends and when, and serves the result to signed-in users.
//!
//! # Overview
//!
//! - Extracted recommendations are cached per video, written once and then
//!   served to every later request for the same video
//! - Free-tier users get a fixed number of analyses per calendar month; a
//!   cached answer still counts as an analysis
//! - Cached sets are queryable by ticker and ranked by how many videos
//!   recommend each stock
//!
//! # Architecture
//!
//! - `video_ref` - YouTube URL parsing
//! - `usage` - Subscription tiers and the monthly usage ledger
//! - `store` - User and recommendation persistence (SQLite, in-memory)
//! - `cache` - Get / put-if-absent view over the recommendation store
//! - `transcript` - Transcript service client
//! - `extraction` - Recommendation extraction with OpenAI
//! - `youtube` - YouTube Data API client for channel uploads
//! - `orchestrator` - The analyze workflow
//! - `api` - HTTP API
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use tipster::config::Settings;
//! use tipster::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let outcome = orchestrator
//!         .analyze("https://youtu.be/dQw4w9WgXcQ", Some("me@example.com"))
//!         .await?;
//!     for rec in &outcome.recommendations {
//!         println!("{} ({}) at {}s", rec.company_name, rec.ticker, rec.timestamp);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod openai;
pub mod orchestrator;
pub mod store;
pub mod transcript;
pub mod usage;
pub mod video_ref;
pub mod youtube;

pub use error::{Result, TipsterError};
