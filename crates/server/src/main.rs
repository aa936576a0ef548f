// crates/server/src/main.rs
//! Alignment job server binary.
//!
//! Hydrates the job slot, serves the API on localhost, and on Ctrl-C drains
//! connections before exiting.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use iep_align_jobs::AlignConfig;
use iep_align_server::{build_coordinator, create_app, shutdown, AppState};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "iep-align")]
#[command(version)]
#[command(about = "Single-slot tracker for IEP alignment jobs")]
struct Cli {
    /// Base URL of the alignment backend
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token for the alignment backend
    #[arg(long)]
    token: Option<String>,

    /// Directory holding the persisted job slot
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Per-request timeout for the alignment backend, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Keep the job slot in memory only
    #[arg(long)]
    no_persist: bool,

    /// Delete the persisted job slot on shutdown
    #[arg(long)]
    clear_on_shutdown: bool,
}

impl Cli {
    /// Apply CLI flags on top of the environment-derived config.
    fn apply(self, mut config: AlignConfig) -> AlignConfig {
        if let Some(url) = self.api_url {
            config.api_base = iep_align_jobs::config::normalize_api_base(&url);
        }
        if let Some(token) = self.token {
            config.auth_token = Some(token);
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = Some(secs);
        }
        if self.no_persist {
            config.persist = false;
        }
        if self.clear_on_shutdown {
            config.clear_on_shutdown = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,iep_align_jobs=info,iep_align_server=info".into()),
        )
        .compact()
        .init();

    let config = Cli::parse().apply(AlignConfig::from_env());
    tracing::debug!(?config, "Resolved configuration");

    eprintln!("\niep-align v{}\n", env!("CARGO_PKG_VERSION"));

    let coordinator = build_coordinator(&config);
    let state = Arc::new(AppState::new(coordinator.clone()));
    let app = create_app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    eprintln!("  Backend: {}", config.api_base);
    eprintln!("  Listening on http://localhost:{}\n", config.port);

    let token = shutdown::install_shutdown_handler();
    axum::serve(listener, app)
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;

    if config.clear_on_shutdown {
        coordinator.hard_clear();
    }
    tracing::info!("Server stopped");

    Ok(())
}
