// Server module entry
// Listener creation, connection handling and the accept loop

pub mod connection;
pub mod listener;

// `loop` is a keyword, so the module is exposed as server_loop
#[path = "loop.rs"]
pub mod server_loop;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::AppState;

pub use connection::ConnectionLimits;
pub use listener::create_listener;
pub use server_loop::start_server_loop;

impl ConnectionLimits {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            max_connections: state.config.server.max_connections,
            timeout: match state.config.server.connection_timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Serve the static file pipeline on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: &AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    start_server_loop(
        listener,
        Arc::clone(&state.pipeline),
        ConnectionLimits::from_state(state),
        shutdown,
    )
    .await
}
