//! History command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the history command.
pub async fn run_history(email: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let videos = orchestrator.recommendations().history(email).await?;

    if videos.is_empty() {
        Output::info(&format!("{} has not analyzed any videos yet.", email));
        return Ok(());
    }

    Output::header(&format!("Analysis history for {} ({})", email, videos.len()));
    println!();

    for video in &videos {
        let tickers: Vec<&str> = video.recommendations.iter().map(|r| r.ticker.as_str()).collect();
        Output::list_item(&format!(
            "{} ({}x, last {})",
            video.url,
            video.analysis_count,
            video.last_analyzed_at.format("%Y-%m-%d %H:%M")
        ));
        if tickers.is_empty() {
            Output::kv("Stocks", "none");
        } else {
            Output::kv("Stocks", &tickers.join(", "));
        }
    }

    Ok(())
}
