//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file
//! itself is picked from `--config`, then `CONFIG_PATH`, then `ledger.toml`
//! in the working directory.

use serde::Deserialize;
use session_auth::{DEFAULT_API_BASE_URL, DEFAULT_LOGIN_PATH, DEFAULT_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Backend API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Overridden by LEDGER_API_BASE_URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Credential persistence and login routing
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("ledger-credentials.json")
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            login_path: default_login_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| common::Error::read(path, e))?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Like `load`, but a missing file at the default location means
    /// "use defaults". An explicitly named file must exist.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        match Self::load(path) {
            Err(e) if e.is_not_found() && path == Path::new(DEFAULT_CONFIG_PATH) => {
                Config::default().finish()
            }
            other => other,
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    fn finish(mut self) -> common::Result<Self> {
        if let Ok(url) = std::env::var("LEDGER_API_BASE_URL") {
            let url = url.trim();
            if !url.is_empty() {
                self.api.base_url = url.to_owned();
            }
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if !self.session.login_path.starts_with('/') {
            return Err(common::Error::Config(format!(
                "login_path must start with /, got: {}",
                self.session.login_path
            )));
        }

        Ok(self)
    }
}
