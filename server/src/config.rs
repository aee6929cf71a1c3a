//! Server configuration, read from a TOML file.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1"
//! port = 4080
//! database = "tallybook.db"
//! key_file = "tallybook-signing.key"
//!
//! [license]
//! trial_days = 30
//! trial_max_users = 1
//!
//! [security]
//! lockout_threshold = 10
//! recovery_window_hours = 24
//!
//! [password]
//! min_length = 8
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tallybook_license::LicenseConfig;
use tallybook_security::{PasswordPolicy, SecurityConfig};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub license: LicenseConfig,
    pub security: SecurityConfig,
    pub password: PasswordPolicy,
}

/// The `[server]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
    pub database: PathBuf,
    /// 32-byte Ed25519 seed used to sign and verify license tokens.
    pub key_file: PathBuf,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 4080,
            database: PathBuf::from("tallybook.db"),
            key_file: PathBuf::from("tallybook-signing.key"),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `path`.
    /// Falls back to defaults if the file is missing or does not parse.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text is not valid configuration.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.security.lockout_threshold, 10);
        assert_eq!(config.security.recovery_window_hours, 24);
        assert_eq!(config.license.trial_days, 30);
        assert_eq!(config.password.min_length, 8);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ServerConfig::parse(
            r#"
            [server]
            port = 9000

            [security]
            lockout_threshold = 5

            [password]
            require_digit = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.security.lockout_threshold, 5);
        assert_eq!(config.security.recovery_window_hours, 24);
        assert!(!config.password.require_digit);
        assert!(config.password.require_letter);
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn kdf_params_are_configurable() {
        let config = ServerConfig::parse(
            r#"
            [security.kdf]
            memory_cost = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.security.kdf.memory_cost, 4096);
        assert_eq!(config.security.kdf.time_cost, 2);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(ServerConfig::parse("[server\nport = ").is_err());
        assert!(ServerConfig::parse("[server]\nport = \"high\"").is_err());
    }

    #[test]
    fn missing_file_falls_back() {
        let config = ServerConfig::load_from(Path::new("/definitely/not/here.toml"));
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn unparsable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tallybook.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert_eq!(ServerConfig::load_from(&path), ServerConfig::default());
    }
}
