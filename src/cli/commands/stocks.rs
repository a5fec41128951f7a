//! Stock query commands.

use crate::cli::output::format_timestamp;
use crate::cli::{Output, StocksAction};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run a stocks subcommand.
pub async fn run_stocks(action: &StocksAction, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let store = orchestrator.recommendations();

    match action {
        StocksAction::Top { limit } => {
            let stocks = store.top_stocks(*limit).await?;
            if stocks.is_empty() {
                Output::info("No recommendations cached yet. Use 'tipster analyze <url>' first.");
                return Ok(());
            }

            Output::header("Most recommended stocks");
            println!();
            for (rank, stock) in stocks.iter().enumerate() {
                println!(
                    "  {:>2}. {} ({}) - {} video{}",
                    rank + 1,
                    stock.company_name,
                    stock.ticker,
                    stock.count,
                    if stock.count == 1 { "" } else { "s" }
                );
            }
        }

        StocksAction::Videos { ticker } => {
            let ticker = ticker.trim();
            if ticker.is_empty() {
                anyhow::bail!("Ticker must not be empty");
            }

            let videos = store.videos_by_ticker(ticker).await?;
            if videos.is_empty() {
                Output::info(&format!("No analyzed videos recommend {}.", ticker));
                return Ok(());
            }

            Output::header(&format!("Videos recommending {} ({})", ticker, videos.len()));
            for video in &videos {
                println!();
                Output::list_item(&video.url);
                for mention in &video.recommendations {
                    Output::kv(
                        &format!("{} @ {}", mention.company_name, format_timestamp(mention.timestamp)),
                        &mention.reason,
                    );
                }
            }
        }
    }

    Ok(())
}
