// Server loop module
// Accepts connections until the shutdown future completes

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::{accept_connection, ConnectionLimits};
use crate::handler::RequestHandler;
use crate::logger;

/// Run the accept loop.
///
/// Accept errors are logged and the loop keeps going; it only returns once
/// `shutdown` resolves. Connections already being served are left to finish
/// on their own tasks.
pub async fn start_server_loop<H, F>(
    listener: TcpListener,
    handler: Arc<H>,
    limits: ConnectionLimits,
    shutdown: F,
) -> std::io::Result<()>
where
    H: RequestHandler + 'static,
    F: Future<Output = ()>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                logger::info(&format!(
                    "Shutting down, {} connection(s) still active",
                    active_connections.load(Ordering::SeqCst)
                ));
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &handler, &active_connections, limits);
                    }
                    Err(e) => logger::severe(&format!("Failed to accept connection: {e}")),
                }
            }
        }
    }
}
