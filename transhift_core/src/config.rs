use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::compat::CompatibilityTable;
use crate::protocol::constants::PROTO_PORT;
use crate::protocol::role::NodeRole;

const APP_QUALIFIER: &str = "org";
const APP_ORGANIZATION: &str = "transhift";
const APP_NAME: &str = "transhift";
const CONFIG_FILE: &str = "config.json";

/// Directory override, mainly for tests
pub const CONFIG_DIR_ENV: &str = "TRANSHIFT_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rendezvous_host: String,
    pub rendezvous_port: u16,
    pub role: NodeRole,
    /// PEM certificate chain presented to the rendezvous; generated when absent
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// PEM roots for strict peer verification; absent means accept any peer
    pub trusted_roots_path: Option<PathBuf>,
    pub require_tls13: bool,
    pub connect_timeout_secs: Option<u64>,
    pub handshake_timeout_secs: Option<u64>,
    pub compatibility: CompatibilityTable,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rendezvous_host: "localhost".to_string(),
            rendezvous_port: PROTO_PORT,
            role: NodeRole::Sender,
            cert_path: None,
            key_path: None,
            trusted_roots_path: None,
            require_tls13: false,
            connect_timeout_secs: Some(15),
            handshake_timeout_secs: Some(30),
            compatibility: CompatibilityTable::default(),
        }
    }
}

impl AppConfig {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Some(PathBuf::from(dir).join(CONFIG_FILE));
        }

        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load config from disk, falling back to defaults when missing or unreadable
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config at {:?}: {:#}", path, e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {:?}", path))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("No config directory available")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write config {:?}", path))
    }

    /// Apply `TRANSHIFT_HOST`, `TRANSHIFT_PORT` and `TRANSHIFT_ROLE` when set
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("TRANSHIFT_HOST") {
            self.rendezvous_host = host;
        }
        if let Ok(port) = std::env::var("TRANSHIFT_PORT") {
            self.rendezvous_port = port
                .parse()
                .with_context(|| format!("Invalid TRANSHIFT_PORT: {}", port))?;
        }
        if let Ok(role) = std::env::var("TRANSHIFT_ROLE") {
            self.role = role.parse()?;
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.rendezvous_port, 50977);
        assert!(config.compatibility.accepts("0.2.0", "0.2.0"));
        assert_eq!(config.handshake_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = AppConfig {
            rendezvous_host: "punch.example.org".to_string(),
            role: NodeRole::Receiver,
            require_tls13: true,
            ..AppConfig::default()
        };
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"rendezvous_host":"10.0.0.2","role":"receiver"}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.rendezvous_host, "10.0.0.2");
        assert_eq!(config.role, NodeRole::Receiver);
        assert_eq!(config.rendezvous_port, PROTO_PORT);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{not json").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }
}
