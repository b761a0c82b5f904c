// Configuration module entry point
// Loads the layered configuration and owns its persistence

mod persist;
mod state;
mod types;

use std::net::SocketAddr;
use std::path::Path;

// Re-export public types
pub use persist::{ConfigStore, PersistError};
pub use state::AppState;
pub use types::{Config, FilesConfig, LoggingConfig, SecuritySettings, ServerConfig};

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

impl Config {
    /// Load configuration from the given TOML file, layered over built-in
    /// defaults and overridden by `WARDEN_*` environment variables
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let settings = config::Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.workers", 10)?
            .set_default("server.max_connections", 1024)?
            .set_default("server.connection_timeout", 30)?
            .set_default("files.document_root", defaults.files.document_root)?
            .set_default("files.index_file", defaults.files.index_file)?
            .set_default("files.error_file", defaults.files.error_file)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.log_file", "run.log")?
            .set_default("security.enable_security", false)?
            .set_default("security.blacklist", Vec::<String>::new())?
            .set_default("security.allowed_hosts", Vec::<String>::new())?
            .add_source(config::File::from(Path::new(config_path)).required(false))
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("security.blacklist")
                    .with_list_parse_key("security.allowed_hosts"),
            )
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.security.normalize();
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

impl SecuritySettings {
    /// Trim entries, drop blanks left behind by `a, b,` style lists and put
    /// IP addresses in canonical form
    pub fn normalize(&mut self) {
        for list in [&mut self.blacklist, &mut self.allowed_hosts] {
            *list = list
                .iter()
                .map(|s| crate::security::canonical_entry(s))
                .filter(|s| !s.is_empty())
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.files.index_file, "index.html");
        assert_eq!(cfg.files.error_file, "50x.html");
        assert!(!cfg.security.enable_security);
        assert!(cfg.security.blacklist.is_empty());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
host = "127.0.0.1"
port = 9090
connection_timeout = 5

[files]
document_root = "public"
index_file = "home.html"
error_file = "oops.html"

[logging]
level = "warning"

[security]
enable_security = true
blacklist = ["9.9.9.9", " 8.8.8.8 ", "", "2001:DB8::1"]
allowed_hosts = ["example.com"]
"#,
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.files.document_root, "public");
        assert_eq!(cfg.logging.level, "warning");
        assert!(cfg.security.enable_security);
        assert_eq!(
            cfg.security.blacklist,
            vec!["9.9.9.9", "8.8.8.8", "2001:db8::1"]
        );
        assert_eq!(cfg.security.allowed_hosts, vec!["example.com"]);
        assert_eq!(
            cfg.get_socket_addr().unwrap(),
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );
    }
}
