pub mod config;
pub mod handlers;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use server::{build_router, start, start_with_relay, AppState, ServerHandle};
pub use shutdown::ShutdownCoordinator;
