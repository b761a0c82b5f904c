//! Static file server with runtime-mutable IP and host access control.

pub mod config;
pub mod control;
pub mod handler;
pub mod http;
pub mod logger;
pub mod security;
pub mod server;
