//! CLI module for Tipster.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Tipster - stock recommendations from YouTube videos
///
/// Extracts the stocks a creator recommends from a video's transcript,
/// caches the result per video and meters free-tier usage per month.
#[derive(Parser, Debug)]
#[command(name = "tipster")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Analyze a video for stock recommendations
    Analyze {
        /// YouTube watch or youtu.be URL
        url: String,

        /// Email of the user the analysis is charged to
        #[arg(short, long, env = "TIPSTER_USER")]
        user: String,
    },

    /// Analyze a channel's recent videos one by one
    AnalyzeChannel {
        /// YouTube channel ID
        channel_id: String,

        /// Email of the user the analyses are charged to
        #[arg(short, long, env = "TIPSTER_USER")]
        user: String,
    },

    /// Show a user's analysis history
    History {
        /// User email
        email: String,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// List a channel's recent long-form videos
    Videos {
        /// YouTube channel ID
        channel_id: String,
    },

    /// Query recommended stocks
    Stocks {
        #[command(subcommand)]
        action: StocksAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Register a user (no-op if the email is known)
    Add {
        email: String,
        name: String,

        /// Avatar URL
        #[arg(long)]
        image: Option<String>,
    },

    /// Set a user's subscription tier
    Tier {
        email: String,
        /// free or premium
        tier: String,
    },

    /// Show a user's tier and usage
    Show { email: String },
}

#[derive(Subcommand, Debug)]
pub enum StocksAction {
    /// Most recommended stocks across all analyzed videos
    Top {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Videos recommending a ticker
    Videos {
        /// Ticker or part of one, e.g. AAPL
        ticker: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from([
            "tipster",
            "-v",
            "analyze",
            "https://youtu.be/abc123",
            "--user",
            "a@x.com",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Analyze { url, user } => {
                assert_eq!(url, "https://youtu.be/abc123");
                assert_eq!(user, "a@x.com");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_actions() {
        let cli = Cli::try_parse_from(["tipster", "stocks", "top", "--limit", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Stocks { action: StocksAction::Top { limit: 3 } }));

        let cli = Cli::try_parse_from(["tipster", "user", "tier", "a@x.com", "premium"]).unwrap();
        assert!(matches!(cli.command, Commands::User { action: UserAction::Tier { .. } }));
    }
}
