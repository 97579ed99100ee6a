//! Configuration module for DeployMate
//!
//! Handles loading configuration from multiple sources:
//! - Default values
//! - The first config file found (`--config`, `$DEPLOYMATE_CONFIG`,
//!   `./deploymate.toml`, `~/.deploymate/config.toml`)
//! - Environment variables
//!
//! Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::connection::config::{expand_path, DEFAULT_TIMEOUT};
use crate::connection::ConnectionConfig;
use crate::error::{Error, Result};
use crate::modules::{BecomeMethod, HandlerSettings};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,
}

/// Default settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Directory relative key files resolve against
    pub key_dir: PathBuf,

    /// Local directory relative upload sources resolve against
    pub files_dir: PathBuf,

    /// Remote staging directory for uploads (login user's home when unset)
    pub staging_dir: Option<String>,

    /// Connection timeout in seconds
    pub connect_timeout: u64,

    /// Privilege escalation program (sudo, doas)
    pub become_method: String,

    /// Reject hosts missing from known_hosts
    pub host_key_checking: bool,

    /// known_hosts file
    pub known_hosts: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from("config"),
            files_dir: PathBuf::from("config/files_to_upload"),
            staging_dir: None,
            connect_timeout: DEFAULT_TIMEOUT,
            become_method: "sudo".to_string(),
            host_key_checking: false,
            known_hosts: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::find_config_file(config_path) {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                Self::from_file(&path)?
            }
            None => Config::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// First existing config file, in priority order.
    ///
    /// An explicit path is returned even when missing so that loading it
    /// reports the error.
    fn find_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit_path {
            return Some(path.to_path_buf());
        }

        let mut candidates = Vec::new();
        if let Ok(env_config) = std::env::var("DEPLOYMATE_CONFIG") {
            candidates.push(PathBuf::from(env_config));
        }
        candidates.push(PathBuf::from("deploymate.toml"));
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".deploymate").join("config.toml"));
        }

        candidates.into_iter().find(|p| p.is_file())
    }

    /// Load a single configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parsed: std::result::Result<Config, String> = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
            "toml" => toml::from_str(&content).map_err(|e| e.to_string()),
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .map_err(|e| e.to_string()),
        };

        parsed.map_err(|e| {
            Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let defaults = &mut self.defaults;

        if let Ok(dir) = std::env::var("DEPLOYMATE_KEY_DIR") {
            defaults.key_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("DEPLOYMATE_FILES_DIR") {
            defaults.files_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("DEPLOYMATE_STAGING_DIR") {
            defaults.staging_dir = Some(dir);
        }

        if let Ok(timeout) = std::env::var("DEPLOYMATE_TIMEOUT") {
            defaults.connect_timeout = timeout.trim().parse().map_err(|_| {
                Error::Config(format!("DEPLOYMATE_TIMEOUT is not a number: '{}'", timeout))
            })?;
        }

        if let Ok(method) = std::env::var("DEPLOYMATE_BECOME_METHOD") {
            defaults.become_method = method;
        }

        if let Ok(flag) = std::env::var("DEPLOYMATE_HOST_KEY_CHECKING") {
            defaults.host_key_checking = parse_flag(&flag).ok_or_else(|| {
                Error::Config(format!(
                    "DEPLOYMATE_HOST_KEY_CHECKING is not a boolean: '{}'",
                    flag
                ))
            })?;
        }

        Ok(())
    }

    pub fn key_dir(&self) -> PathBuf {
        expand_path(&self.defaults.key_dir.to_string_lossy())
    }

    pub fn files_dir(&self) -> PathBuf {
        expand_path(&self.defaults.files_dir.to_string_lossy())
    }

    pub fn become_method(&self) -> Result<BecomeMethod> {
        self.defaults.become_method.parse().map_err(Error::Config)
    }

    /// SSH settings for the connection manager
    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: self.defaults.connect_timeout,
            host_key_checking: self.defaults.host_key_checking,
            known_hosts: self.defaults.known_hosts.clone(),
        }
    }

    /// Settings injected into resource handlers
    pub fn handler_settings(&self) -> Result<HandlerSettings> {
        Ok(HandlerSettings {
            become_method: self.become_method()?,
            files_dir: self.files_dir(),
            staging_dir: self.defaults.staging_dir.clone(),
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.key_dir, PathBuf::from("config"));
        assert_eq!(config.defaults.connect_timeout, 30);
        assert_eq!(config.become_method().unwrap(), BecomeMethod::Sudo);
        assert!(!config.to_connection_config().host_key_checking);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[defaults]\nstaging_dir = \"/var/tmp\"\nbecome_method = \"doas\"\nconnect_timeout = 5"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.staging_dir.as_deref(), Some("/var/tmp"));
        assert_eq!(config.defaults.connect_timeout, 5);
        // unset keys keep their defaults
        assert_eq!(config.defaults.files_dir, PathBuf::from("config/files_to_upload"));

        let settings = config.handler_settings().unwrap();
        assert_eq!(settings.become_method, BecomeMethod::Doas);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "defaults:\n  host_key_checking: true").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.defaults.host_key_checking);
    }

    #[test]
    fn test_invalid_become_method() {
        let mut config = Config::default();
        config.defaults.become_method = "pkexec".into();
        assert!(matches!(config.handler_settings(), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/nonexistent/deploymate.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("DEPLOYMATE_TIMEOUT", "12");
        std::env::set_var("DEPLOYMATE_HOST_KEY_CHECKING", "yes");
        let mut config = Config::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("DEPLOYMATE_TIMEOUT");
        std::env::remove_var("DEPLOYMATE_HOST_KEY_CHECKING");

        result.unwrap();
        assert_eq!(config.defaults.connect_timeout, 12);
        assert!(config.defaults.host_key_checking);
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_bad_timeout() {
        std::env::set_var("DEPLOYMATE_TIMEOUT", "soon");
        let mut config = Config::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("DEPLOYMATE_TIMEOUT");

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
