pub mod cli;
pub mod config;
pub mod db;
pub mod tracking;
mod utils;
pub mod vision;

use clap::Parser;

pub use config::TrackerConfig;
pub use db::Database;
pub use tracking::{AttentionTracker, FrameRequest, FrameResult, ParticipantKey, SessionWindow};
pub use vision::{Detector, GeometricScorer, ScoringConfig};

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

pub async fn run() -> anyhow::Result<()> {
    init_logging();
    log::info!("attention-tracker starting up...");

    let cli = cli::Cli::parse();
    cli::execute(cli).await
}
