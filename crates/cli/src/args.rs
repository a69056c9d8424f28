//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

/// skypost: posts new feed and news articles to Bluesky with hashtags and link cards
#[derive(Parser, Debug)]
#[command(name = "skypost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: ./skypost.toml when present)
    #[arg(short, long, env = "SKYPOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SKYPOST_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Compose and log posts without publishing or recording them
    #[arg(long, env = "SKYPOST_DRY_RUN")]
    pub dry_run: bool,
}
