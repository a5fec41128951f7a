//! CLI command implementations.

mod analyze;
mod config;
mod history;
mod serve;
mod stocks;
mod user;
mod videos;

pub use analyze::{run_analyze, run_analyze_channel};
pub use config::run_config;
pub use history::run_history;
pub use serve::run_serve;
pub use stocks::run_stocks;
pub use user::run_user;
pub use videos::run_videos;
