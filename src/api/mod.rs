//! HTTP API for Tipster.
//!
//! JSON endpoints for analysis, user registration, history and the stock
//! aggregations. The caller's identity arrives in a header set by the
//! fronting web layer.

mod error;

use crate::error::{Result, TipsterError};
use crate::orchestrator::Orchestrator;
use crate::store::{AnalyzedVideo, NewUser, RecommendationEntry, StockCount, StockVideo, UserRecord};
use crate::usage::UsageLedger;
use crate::youtube::RecentVideo;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, HeaderName},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const DEFAULT_TOP_LIMIT: usize = 10;

/// Shared application state.
pub struct AppState {
    orchestrator: Orchestrator,
    identity_header: HeaderName,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Result<Self> {
        let header = &orchestrator.settings().server.identity_header;
        let identity_header = HeaderName::from_bytes(header.to_lowercase().as_bytes())
            .map_err(|e| TipsterError::Config(format!("Invalid identity header '{}': {}", header, e)))?;

        Ok(Self {
            orchestrator,
            identity_header,
        })
    }

    fn identity<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get(&self.identity_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/users", post(create_user))
        .route("/api/history", get(history))
        .route("/api/stocks/top", get(top_stocks))
        .route("/api/stocks/{ticker}/videos", get(stock_videos))
        .route("/api/channels/{channel_id}/videos", get(channel_videos))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(rename = "videoReference", alias = "videoUrl", default)]
    video_reference: String,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    recommendations: Vec<RecommendationEntry>,
    video_id: String,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageLedger>,
}

#[derive(Deserialize)]
struct CreateUserRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Serialize)]
struct CreateUserResponse {
    success: bool,
    user: UserRecord,
}

#[derive(Serialize)]
struct HistoryResponse {
    videos: Vec<AnalyzedVideo>,
}

#[derive(Deserialize)]
struct TopQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct TopStocksResponse {
    stocks: Vec<StockCount>,
}

#[derive(Serialize)]
struct StockVideosResponse {
    ticker: String,
    videos: Vec<StockVideo>,
}

#[derive(Serialize)]
struct ChannelVideosResponse {
    videos: Vec<RecentVideo>,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>> {
    let Json(req) = payload?;
    let outcome = state
        .orchestrator
        .analyze(&req.video_reference, state.identity(&headers))
        .await?;

    Ok(Json(AnalyzeResponse {
        recommendations: outcome.recommendations,
        video_id: outcome.video_id,
        cached: outcome.from_cache,
        usage: outcome.usage,
    }))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<CreateUserResponse>> {
    let Json(req) = payload?;
    let new_user = NewUser {
        email: req.email,
        name: req.name,
        image: req.image,
    };
    let user = state.orchestrator.register_user(&new_user, Utc::now()).await?;

    Ok(Json(CreateUserResponse { success: true, user }))
}

async fn history(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<HistoryResponse>> {
    let email = state.identity(&headers).ok_or(TipsterError::Unauthenticated)?;
    let videos = state.orchestrator.recommendations().history(email).await?;
    Ok(Json(HistoryResponse { videos }))
}

async fn top_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> Result<Json<TopStocksResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    let stocks = state.orchestrator.recommendations().top_stocks(limit).await?;
    Ok(Json(TopStocksResponse { stocks }))
}

async fn stock_videos(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Json<StockVideosResponse>> {
    let ticker = ticker.trim().to_string();
    if ticker.is_empty() {
        return Err(TipsterError::InvalidInput("ticker is required".to_string()));
    }

    let videos = state.orchestrator.recommendations().videos_by_ticker(&ticker).await?;
    Ok(Json(StockVideosResponse { ticker, videos }))
}

async fn channel_videos(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<ChannelVideosResponse>> {
    let videos = state.orchestrator.recent_videos(&channel_id, Utc::now()).await?;
    Ok(Json(ChannelVideosResponse { videos }))
}
