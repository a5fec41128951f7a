//! HTTP API server command.

use crate::api::{router, AppState};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::sync::Arc;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let identity_header = settings.server.identity_header.clone();

    let orchestrator = Orchestrator::new(settings)?;
    let state = Arc::new(AppState::new(orchestrator)?);
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Tipster API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Identity header", &identity_header);
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Analyze", "POST /api/analyze");
    Output::kv("Register user", "POST /api/users");
    Output::kv("History", "GET  /api/history");
    Output::kv("Top stocks", "GET  /api/stocks/top");
    Output::kv("Videos by stock", "GET  /api/stocks/{ticker}/videos");
    Output::kv("Channel videos", "GET  /api/channels/{channel_id}/videos");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}
