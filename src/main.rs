//! Wikimirror main entry point
//!
//! Command-line interface for the wikimirror offline bundle builder.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wikimirror::config::load_config_with_hash;
use wikimirror::Session;

/// Wikimirror: an offline mirror builder for MediaWiki-style sites
///
/// Wikimirror probes which content-retrieval APIs a target site exposes,
/// picks a matching render strategy, and harvests articles, media, and
/// redirects into a self-contained offline bundle.
#[derive(Parser, Debug)]
#[command(name = "wikimirror")]
#[command(version = "0.1.0")]
#[command(about = "Build an offline bundle from a MediaWiki-style site", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Probe and enumerate without fetching any content
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    tracing::info!(
        "Target: {} (mode: {}, speed: {})",
        config.harvest.base_url,
        config.harvest.mode,
        config.harvest.speed
    );

    let session = match Session::start(config).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };

    let outcome = if cli.dry_run {
        session.dry_run().await
    } else {
        session.run().await
    };

    match outcome {
        Ok(summary) => {
            tracing::info!(
                "Harvest finished: {} articles ({} soft-failed, {} hard-failed), {} media, {} redirects",
                summary.articles_ok,
                summary.articles_soft_failed,
                summary.articles_hard_failed,
                summary.media_ok,
                summary.redirects
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wikimirror=info,warn"),
            1 => EnvFilter::new("wikimirror=debug,info"),
            2 => EnvFilter::new("wikimirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
