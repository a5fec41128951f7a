//! Videos command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use chrono::Utc;

/// Run the videos command.
pub async fn run_videos(channel_id: &str, settings: Settings) -> Result<()> {
    let window = settings.youtube.recent_window_days;
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Fetching recent videos...");
    let videos = orchestrator.recent_videos(channel_id, Utc::now()).await;
    spinner.finish_and_clear();
    let videos = videos?;

    if videos.is_empty() {
        Output::info(&format!("No long-form uploads in the last {} days.", window));
        return Ok(());
    }

    Output::header(&format!("Recent videos ({})", videos.len()));
    println!();
    for video in &videos {
        Output::list_item(&format!("{} ({})", video.title, video.published_at.format("%Y-%m-%d")));
        Output::kv("URL", &video.url);
    }

    Ok(())
}
