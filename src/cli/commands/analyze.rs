//! Analyze commands: a single video or a channel's recent uploads.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::TipsterError;
use crate::openai::is_api_key_configured;
use crate::orchestrator::{AnalysisOutcome, ChannelVideoStatus, Orchestrator};
use crate::video_ref::watch_url;
use anyhow::Result;
use chrono::Utc;

fn warn_missing_api_key() {
    if !is_api_key_configured() {
        Output::warning("OPENAI_API_KEY is not set; uncached videos will fail to analyze.");
    }
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let url = watch_url(&outcome.video_id);

    if outcome.recommendations.is_empty() {
        Output::info("No stock recommendations found in this video.");
    } else {
        Output::header(&format!(
            "{} recommendations{}",
            outcome.recommendations.len(),
            if outcome.from_cache { " (cached)" } else { "" }
        ));
        for entry in &outcome.recommendations {
            Output::recommendation(entry, &url);
        }
        println!();
    }

    if let Some(usage) = &outcome.usage {
        Output::kv("Usage this month", &format!("{} ({})", usage.count, usage.month));
    }
}

/// Run the analyze command.
pub async fn run_analyze(url: &str, user: &str, settings: Settings) -> Result<()> {
    warn_missing_api_key();
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Analyzing video...");
    let result = orchestrator.analyze(url, Some(user)).await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(e @ TipsterError::QuotaExceeded { .. }) => {
            Output::error(&e.to_string());
            Output::info(&format!("Upgrade with: tipster user tier {} premium", user));
            Err(e.into())
        }
        Err(e) => {
            Output::error(&format!("Analysis failed: {}", e));
            Err(e.into())
        }
    }
}

/// Run the analyze-channel command.
pub async fn run_analyze_channel(channel_id: &str, user: &str, settings: Settings) -> Result<()> {
    warn_missing_api_key();
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Analyzing recent videos...");
    let reports = orchestrator.analyze_channel(channel_id, user, Utc::now()).await;
    spinner.finish_and_clear();
    let reports = reports?;

    if reports.is_empty() {
        Output::info("No recent long-form videos on this channel.");
        return Ok(());
    }

    Output::header(&format!("Channel {} ({} videos)", channel_id, reports.len()));
    let mut analyzed = 0;
    for report in &reports {
        match &report.status {
            ChannelVideoStatus::Analyzed(outcome) => {
                analyzed += 1;
                Output::list_item(&format!(
                    "{} - {} recommendations{}",
                    report.video.title,
                    outcome.recommendations.len(),
                    if outcome.from_cache { " (cached)" } else { "" }
                ));
                for entry in &outcome.recommendations {
                    Output::kv(&entry.ticker, &entry.company_name);
                }
            }
            ChannelVideoStatus::Failed(reason) => {
                Output::warning(&format!("{} - {}", report.video.title, reason));
            }
            ChannelVideoStatus::Skipped => {
                Output::list_item(&format!("{} - skipped", report.video.title));
            }
        }
    }

    println!();
    Output::success(&format!("Analyzed {} of {} videos", analyzed, reports.len()));
    Ok(())
}
