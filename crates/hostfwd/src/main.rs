//! hostfwd - host firmware activation daemon
//!
//! Watches the staging root, flashes requested images into the single
//! host firmware slot and publishes activation state.

use anyhow::Result;
use clap::Parser;
use hostfw_shared::VERSION;
use hostfwd::config::Config;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostfwd")]
#[command(about = "Host firmware activation daemon", long_about = None)]
#[command(version = VERSION)]
struct Args {
    /// Configuration file (defaults to /etc/hostfw/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("hostfwd v{} starting", VERSION);

    let config = match args.config {
        Some(path) => Config::load_from_path(&path)?,
        None => Config::load(),
    };

    hostfwd::daemon::run(config).await?;

    info!("Shutting down gracefully");
    Ok(())
}
