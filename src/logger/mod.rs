//! Logger module
//!
//! Provides logging utilities for the server including:
//! - Server lifecycle logging
//! - Request and access logging
//! - Error response logging at the level matching the status
//! - File-based logging support

pub mod writer;

pub use writer::Level;

use crate::config::Config;
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    let level = config.logging.level.parse().unwrap_or_else(|e| {
        eprintln!("[logger] {e}, falling back to info");
        Level::Info
    });
    writer::init(level, config.logging.log_file.as_deref())
}

/// Write a message through the global writer, or the console before `init`
pub fn write(level: Level, message: &str) {
    match writer::get() {
        Some(w) => w.write(level, message),
        None => writer::write_console(level, &writer::format_line(level, message)),
    }
}

pub fn info(message: &str) {
    write(Level::Info, message);
}

pub fn warning(message: &str) {
    write(Level::Warning, message);
}

pub fn severe(message: &str) {
    write(Level::Severe, message);
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    info("======================================");
    info("Server started successfully");
    info(&format!("Listening on: http://{addr}"));
    info(&format!("Document root: {}", config.files.document_root));
    info(&format!(
        "Security: {}",
        if config.security.enable_security {
            "enabled"
        } else {
            "disabled"
        }
    ));
    if let Some(workers) = config.server.workers {
        info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.log_file {
        info(&format!("Log file: {path}"));
    }
    info("======================================");
}

pub fn log_request(ip: &str, host: &str, method: &str, uri: &str) {
    info(&format!("Request: {ip} ({host}) - method: {method} - URI: {uri}"));
}

/// Log an emitted error response: 404 at info, 5xx at severe, other codes at warning
pub fn log_error_response(ip: &str, status: u16, uri: &str) {
    let message = format!("{ip} - error {status}: {uri}");
    match status {
        404 => info(&message),
        s if s >= 500 => severe(&message),
        _ => warning(&message),
    }
}

pub fn log_rejection(ip: &str, uri: &str, reason: &str) {
    warning(&format!("{ip} - forbidden ({reason}): {uri}"));
}

pub fn log_html_access(ip: &str, uri: &str) {
    info(&format!("{ip} - access: {uri}"));
}

pub fn log_resource_access(ip: &str, uri: &str, mime: &str) {
    info(&format!("{ip} - access: {uri} (resource, MIME: {mime})"));
}

pub fn log_ip_host_access(ip: &str) {
    warning(&format!(
        "Client {ip} reached the server by IP address instead of a host name"
    ));
}

pub fn log_traversal_attempt(uri: &str) {
    warning(&format!("Path traversal attempt blocked: {uri}"));
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Display) {
    warning(&format!("Failed to serve connection: {err}"));
}

pub fn log_persist_failure(err: &impl std::fmt::Display) {
    severe(&format!("Failed to persist security configuration: {err}"));
}

pub fn log_security_mutation(action: &str, list: &str, value: &str) {
    info(&format!("Security {list} {action}: {value}"));
}
