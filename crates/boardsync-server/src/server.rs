use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use boardsync_relay::RelayService;
use boardsync_store::JsonFileStore;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::handlers;
use crate::shutdown::ShutdownCoordinator;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    pub keep_alive: Duration,
    pub started_at: DateTime<Utc>,
}

/// Build the Axum router: relay endpoints, then static assets for
/// everything else.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/events", get(handlers::events))
        .route("/state", get(handlers::state))
        .route("/patch", post(handlers::patch))
        .route("/health", get(handlers::health))
        .route_service("/", ServeFile::new(config.landing_path()))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Open the configured state file, build the relay and start serving.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let store = Arc::new(JsonFileStore::new(config.state_path()));
    info!(path = %store.path().display(), "using state file");
    let relay = Arc::new(RelayService::new(store, config.max_send_queue));
    start_with_relay(config, relay).await
}

/// Start serving an existing relay. Returns a handle to shut it down.
pub async fn start_with_relay(
    config: ServerConfig,
    relay: Arc<RelayService>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState {
        relay: Arc::clone(&relay),
        keep_alive: Duration::from_secs(config.keep_alive_secs),
        started_at: Utc::now(),
    };
    let router = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let local_addr = listener.local_addr()?;

    let shutdown = ShutdownCoordinator::new();
    let token = shutdown.token();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "server terminated");
        }
    });

    info!(addr = %local_addr, "boardsync server started");

    Ok(ServerHandle {
        addr: local_addr,
        relay,
        shutdown,
        shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
        server,
    })
}

/// Handle returned by `start()`. Keeps the server task alive.
pub struct ServerHandle {
    addr: SocketAddr,
    relay: Arc<RelayService>,
    shutdown: ShutdownCoordinator,
    shutdown_timeout: Duration,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn relay(&self) -> &Arc<RelayService> {
        &self.relay
    }

    /// Stop accepting connections, end every open stream (refusing new
    /// ones) and wait for the server to drain.
    pub async fn shutdown(self) {
        self.shutdown.shutdown();
        self.relay.close_all();
        self.shutdown
            .drain(vec![self.server], self.shutdown_timeout)
            .await;
        info!("boardsync server stopped");
    }
}
