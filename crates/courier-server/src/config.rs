//! Logic-node configuration: optional TOML file with per-field defaults.

use courier_core::wire::service;
use courier_core::{CourierError, CourierResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, info_span, Span};

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub log: LogSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Node id of this logic server on the fabric.
    #[serde(default = "default_service_id")]
    pub service_id: String,
    /// Service family, e.g. `chat` or `login`.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Deadline for a peer's handshake frame.
    #[serde(default = "default_accept_timeout")]
    pub accept_timeout_secs: u64,
    /// Inbound queue size per fabric node.
    #[serde(default = "default_fabric_capacity")]
    pub fabric_capacity: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            service_id: default_service_id(),
            service_name: default_service_name(),
            accept_timeout_secs: default_accept_timeout(),
            fabric_capacity: default_fabric_capacity(),
        }
    }
}

/// `[log]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_service_id() -> String {
    "chat-01".to_string()
}
fn default_service_name() -> String {
    service::CHAT.to_string()
}
fn default_accept_timeout() -> u64 {
    10
}
fn default_fabric_capacity() -> usize {
    1024
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service_id: String,
    pub service_name: String,
    pub accept_timeout: Duration,
    pub fabric_capacity: usize,
    pub log_level: String,
}

impl ServerConfig {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(config_path: Option<&Path>) -> CourierResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    toml::from_str::<ConfigFile>(&content)
                        .map_err(|e| CourierError::Other(format!("config parse error: {e}")))?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        if file_config.server.service_id.is_empty() {
            return Err(CourierError::Other("server.service_id must not be empty".into()));
        }

        Ok(Self {
            service_id: file_config.server.service_id,
            service_name: file_config.server.service_name,
            accept_timeout: Duration::from_secs(file_config.server.accept_timeout_secs),
            fabric_capacity: file_config.server.fabric_capacity,
            log_level: file_config.log.level,
        })
    }

    /// Root span carrying this node's identity; handed to the router and
    /// the connection handler.
    pub fn span(&self) -> Span {
        info_span!("serv", service = %self.service_name, id = %self.service_id)
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.service_id, "chat-01");
        assert_eq!(config.service_name, "chat");
        assert_eq!(config.accept_timeout, Duration::from_secs(10));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.fabric_capacity, 1024);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        let content = r#"
[server]
service_id = "chat-07"
accept_timeout_secs = 3

[log]
level = "debug"
"#;
        std::fs::write(&path, content).unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.service_id, "chat-07");
        assert_eq!(config.service_name, "chat");
        assert_eq!(config.accept_timeout, Duration::from_secs(3));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn login_node_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("login.toml");
        let content = "[server]\nservice_id = \"login-01\"\nservice_name = \"login\"\n";
        std::fs::write(&path, content).unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.service_name, service::LOGIN);
        assert_eq!(config.service_id, "login-01");
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        std::fs::write(&path, "[server\nservice_id = ").unwrap();
        assert!(ServerConfig::load(Some(&path)).is_err());

        std::fs::write(&path, "[server]\nservice_id = \"\"\n").unwrap();
        assert!(ServerConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn tilde_is_expanded() {
        let expanded = expand_tilde(Path::new("~/x/courier.toml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("x/courier.toml"));
        }
        assert_eq!(expand_tilde(Path::new("/etc/c.toml")), PathBuf::from("/etc/c.toml"));
    }
}
