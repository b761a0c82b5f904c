//! Line-oriented control channel
//!
//! Reads commands from the console and mutates the access-control lists or
//! reports access counters. Every command produces one human-readable reply.

use std::fmt::Write as _;
use std::net::IpAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::handler::AccessRecorder;
use crate::logger;
use crate::security::{Mutation, SecurityStore};

const HELP: &str = "\
Available commands:
  list              - show HTML access counts per client IP
  add <ip>          - add an IP address to the blacklist
  remove <ip>       - remove an IP address from the blacklist
  allow <host>      - add a host name or IP to the allowed hosts
  disallow <host>   - remove a host name or IP from the allowed hosts
  status            - show the security flag and list sizes
  help              - show this message";

/// Parsed control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Add(IpAddr),
    Remove(IpAddr),
    Allow(String),
    Disallow(String),
    Status,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Unknown command: {0}. Type 'help' for a list of commands")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),
}

impl Command {
    /// Parse one input line; the command word is case-insensitive
    pub fn parse(line: &str) -> Result<Self, ControlError> {
        let mut parts = line.split_whitespace();
        let word = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();
        let extra = parts.next().is_some();

        let single_arg = |usage: &'static str| match arg {
            Some(a) if !extra => Ok(a),
            _ => Err(ControlError::Usage(usage)),
        };
        let ip_arg = |usage: &'static str| {
            let raw = single_arg(usage)?;
            raw.parse::<IpAddr>()
                .map_err(|_| ControlError::InvalidIp(raw.to_string()))
        };

        match word.as_str() {
            "list" => Ok(Self::List),
            "status" => Ok(Self::Status),
            "help" => Ok(Self::Help),
            "add" => ip_arg("add <ip>").map(Self::Add),
            "remove" => ip_arg("remove <ip>").map(Self::Remove),
            "allow" => single_arg("allow <host>").map(|h| Self::Allow(h.to_string())),
            "disallow" => single_arg("disallow <host>").map(|h| Self::Disallow(h.to_string())),
            _ => Err(ControlError::Unknown(line.trim().to_string())),
        }
    }
}

/// Executes commands against the shared stores
#[derive(Clone)]
pub struct Controller {
    security: Arc<SecurityStore>,
    access: Arc<AccessRecorder>,
}

impl Controller {
    pub const fn new(security: Arc<SecurityStore>, access: Arc<AccessRecorder>) -> Self {
        Self { security, access }
    }

    pub fn execute(&self, command: &Command) -> String {
        match command {
            Command::List => self.list(),
            Command::Add(ip) => {
                let ip = ip.to_string();
                if self.security.mutate(Mutation::Add, &ip) {
                    format!("IP {ip} added to the blacklist")
                } else {
                    format!("IP {ip} is already blacklisted")
                }
            }
            Command::Remove(ip) => {
                let ip = ip.to_string();
                if self.security.mutate(Mutation::Remove, &ip) {
                    format!("IP {ip} removed from the blacklist")
                } else {
                    format!("IP {ip} was not blacklisted")
                }
            }
            Command::Allow(host) => {
                if self.security.mutate_allowed_hosts(Mutation::Add, host) {
                    format!("Host {host} added to the allowed hosts")
                } else {
                    format!("Host {host} is already allowed")
                }
            }
            Command::Disallow(host) => {
                if self.security.mutate_allowed_hosts(Mutation::Remove, host) {
                    format!("Host {host} removed from the allowed hosts")
                } else {
                    format!("Host {host} was not in the allowed hosts")
                }
            }
            Command::Status => {
                let snap = self.security.snapshot();
                format!(
                    "Security: {}\nBlacklisted IPs: {}\nAllowed hosts: {}",
                    if snap.enabled { "enabled" } else { "disabled" },
                    snap.blacklist.len(),
                    if snap.allowed_hosts.is_empty() {
                        "any".to_string()
                    } else {
                        snap.allowed_hosts.len().to_string()
                    }
                )
            }
            Command::Help => HELP.to_string(),
        }
    }

    /// Parse and execute one line; `None` for blank input
    pub fn handle_line(&self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        Some(match Command::parse(line) {
            Ok(command) => self.execute(&command),
            Err(e) => e.to_string(),
        })
    }

    fn list(&self) -> String {
        let counts = self.access.snapshot();
        if counts.is_empty() {
            return "No HTML accesses recorded".to_string();
        }
        let mut out = String::from("Access records:");
        for (ip, count) in counts {
            let _ = write!(out, "\nIP: {ip}, accesses: {count}");
        }
        out
    }

    /// Serve commands from `input` until end of stream, writing replies to `output`.
    ///
    /// Mutations write the configuration file synchronously, so each command
    /// runs on the blocking pool.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let controller = self.clone();
            let reply = tokio::task::spawn_blocking(move || controller.handle_line(&line))
                .await
                .map_err(std::io::Error::other)?;
            if let Some(reply) = reply {
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
        }
        Ok(())
    }
}

/// Spawn the console control channel on stdin/stdout
pub fn spawn_console(controller: Controller) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        if let Err(e) = controller.run(stdin, tokio::io::stdout()).await {
            logger::severe(&format!("Control channel failed: {e}"));
        }
        logger::info("Control channel closed");
    })
}
