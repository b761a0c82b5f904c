// Connection handling module
// Accepts a single TCP connection and serves it with the request handler

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::header::HOST;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;

use crate::handler::{RequestContext, RequestHandler};
use crate::logger;

/// Upper bound on the reverse lookup done for each new connection
const REVERSE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-connection limits shared by every accepted connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_connections: Option<u64>,
    /// Upper bound on the lifetime of one connection; `None` for no limit
    pub timeout: Option<Duration>,
}

/// Accept a connection, enforcing the connection limit.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `handler` - Request handler shared by all connections
/// * `conn_counter` - Active connection counter
/// * `limits` - Connection limit and timeout
pub fn accept_connection<H>(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    handler: &Arc<H>,
    conn_counter: &Arc<AtomicUsize>,
    limits: ConnectionLimits,
) where
    H: RequestHandler + 'static,
{
    // Increment first, then check, so two accepts cannot both pass the limit
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = limits.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(
        stream,
        peer_addr,
        Arc::clone(handler),
        Arc::clone(conn_counter),
        limits.timeout,
    );
}

/// Serve one connection on its own task, then release its counter slot
fn handle_connection<H>(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    conn_counter: Arc<AtomicUsize>,
    timeout: Option<Duration>,
) where
    H: RequestHandler + 'static,
{
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let remote_ip = peer_addr.ip().to_canonical();
        let remote_host: Arc<str> = resolve_peer_name(remote_ip).await.into();

        let conn = http1::Builder::new().keep_alive(true).serve_connection(
            io,
            service_fn(move |req: Request<Incoming>| {
                let handler = Arc::clone(&handler);
                let remote_host = Arc::clone(&remote_host);
                async move {
                    let ctx = request_context(&req, remote_ip, &remote_host);
                    Ok::<_, Infallible>(handler.handle(ctx).await)
                }
            }),
        );

        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, conn).await.map_err(|_| limit),
            None => Ok(conn.await),
        };
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(limit) => logger::warning(&format!(
                "Connection from {peer_addr} timed out after {} seconds",
                limit.as_secs()
            )),
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Host name of the peer by reverse lookup, or its IP text when the lookup
/// fails, finds nothing or takes too long
pub async fn resolve_peer_name(ip: IpAddr) -> String {
    let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip));
    let name = match tokio::time::timeout(REVERSE_LOOKUP_TIMEOUT, lookup).await {
        Ok(Ok(Ok(name))) => Some(name),
        _ => None,
    };
    peer_name_or_ip(ip, name)
}

fn peer_name_or_ip(ip: IpAddr, name: Option<String>) -> String {
    name.map(|n| n.trim_end_matches('.').to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| ip.to_string())
}

/// Extract what the pipeline needs from the wire request
pub fn request_context<B>(
    req: &Request<B>,
    remote_ip: IpAddr,
    remote_host: &str,
) -> RequestContext {
    let target = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), ToString::to_string);
    let ctx = RequestContext::new(req.method().clone(), target, remote_ip)
        .with_remote_host(remote_host);
    // A header that is not valid text still counts as present; the lossy
    // form cannot match an allowed host.
    match req.headers().get(HOST) {
        Some(host) => ctx.with_host_header(String::from_utf8_lossy(host.as_bytes())),
        None => ctx,
    }
}
