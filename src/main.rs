//! course-engine - course catalog, enrollment and progress records

use clap::Parser;
use course_engine::cli::{self, Cli};
use course_engine::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // RUST_LOG wins; otherwise --verbose, then the configured level (warn by default)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.verbose { "info" } else { config.logging.level.as_str() };
        EnvFilter::new(level)
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    cli::run(cli, config).await
}
