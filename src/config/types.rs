// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
    pub logging: LoggingConfig,
    pub security: SecuritySettings,
}

/// Listener and worker configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u64>,
    /// Upper bound in seconds for serving a single connection
    pub connection_timeout: u64,
}

/// Document root and special file names
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FilesConfig {
    pub document_root: String,
    pub index_file: String,
    /// Error page served for 403/404/500, relative to the document root
    pub error_file: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file path (console if not set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

/// Persisted access-control settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct SecuritySettings {
    pub enable_security: bool,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: Some(10),
                max_connections: Some(1024),
                connection_timeout: 30,
            },
            files: FilesConfig {
                document_root: "http".to_string(),
                index_file: "index.html".to_string(),
                error_file: "50x.html".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                log_file: Some("run.log".to_string()),
            },
            security: SecuritySettings::default(),
        }
    }
}
