//! a11y-gate server
//!
//! Quota-gated accessibility scanning with a paid 24h unlock.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use a11y_gate::browser::{BrowserConfig, ChromiumEngine};
use a11y_gate::config::AppConfig;
use a11y_gate::cors::cors_layer;
use a11y_gate::scan::ScanConfig;
use a11y_gate::server::{self, AppState};

/// a11y-gate server
#[derive(Parser, Debug)]
#[command(name = "a11y-gate")]
#[command(version)]
#[command(about = "Entitlement and quota gateway for on-demand accessibility scans")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "4000")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to Chrome/Chromium executable
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<String>,

    /// Disable Chromium's sandbox (needed in most containers)
    #[arg(long)]
    no_sandbox: bool,

    /// Rendering sessions allowed at once
    #[arg(long, default_value = "2")]
    max_concurrent_scans: usize,

    /// Seconds a scan waits for a free rendering slot
    #[arg(long, default_value = "30")]
    scan_queue_timeout_secs: u64,

    /// Seconds between sweeps of expired entitlements and quota windows
    #[arg(long, default_value = "600")]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_filter = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env().context("loading configuration")?;

    let mut browser = BrowserConfig::builder().sandbox(!args.no_sandbox);
    if let Some(path) = args.chrome_path {
        browser = browser.chrome_path(path);
    }
    let axe = config.axe.load().await.context("loading axe-core")?;
    let engine = Arc::new(ChromiumEngine::new(browser.build(), axe));

    let scan = ScanConfig {
        max_concurrent: args.max_concurrent_scans,
        queue_timeout: Duration::from_secs(args.scan_queue_timeout_secs),
        ..ScanConfig::default()
    };

    let state = Arc::new(AppState::from_config(&config, engine, scan));
    let cors = cors_layer(&config.cors_origins).context("building CORS policy")?;

    let sweeper = server::spawn_sweeper(
        Arc::clone(&state),
        Duration::from_secs(args.sweep_interval_secs.max(1)),
    );

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;

    tracing::info!(
        %addr,
        quota_max = config.quota.max,
        quota_window_secs = config.quota.window.num_seconds(),
        max_concurrent_scans = args.max_concurrent_scans,
        "a11y-gate starting"
    );

    server::serve(server::app(state, cors), addr).await?;
    sweeper.abort();

    tracing::info!("a11y-gate stopped");
    Ok(())
}
