use std::path::PathBuf;

use anyhow::Context;
use boardsync_server::ServerConfig;
use boardsync_telemetry::TelemetryConfig;
use clap::Parser;
use tracing::Level;

/// Real-time board state relay: one shared JSON document, pushed to every
/// client over server-sent events and persisted for late joiners.
#[derive(Debug, Parser)]
#[command(name = "boardsync", version)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8787)]
    port: u16,

    /// Directory holding the persisted board state.
    #[arg(long, env = "DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Directory static assets are served from.
    #[arg(long, env = "STATIC_DIR", default_value = ".")]
    static_dir: PathBuf,

    /// Asset served at `/`.
    #[arg(long, env = "LANDING_PAGE", default_value = "index.html")]
    landing_page: String,

    /// Default log level (RUST_LOG takes precedence).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            data_dir: self.data_dir.clone(),
            static_dir: self.static_dir.clone(),
            landing_page: self.landing_page.clone(),
            ..Default::default()
        }
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level,
            json: self.log_json,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    boardsync_telemetry::init_telemetry(&cli.telemetry_config())
        .context("failed to initialize logging")?;

    let config = cli.server_config();
    tracing::info!(
        data_file = %config.state_path().display(),
        static_dir = %config.static_dir.display(),
        "starting boardsync"
    );

    let handle = boardsync_server::start(config)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port(), "boardsync ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}
