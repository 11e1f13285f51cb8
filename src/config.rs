use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::app::DEFAULT_UPLOAD_LIMIT;
use crate::domain::ConnectionContext;
use crate::error::MigrateError;
use crate::transport::DEFAULT_TIMEOUT;

pub const CONFIG_FILE: &str = "rdlm.json";

/// Connection profile as written in `rdlm.json`.
#[derive(Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub upload_limit: Option<usize>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("upload_limit", &self.upload_limit)
            .finish()
    }
}

/// Values supplied from outside the file; each one wins over the file.
#[derive(Default, Clone)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            server_url: env_value("RDLM_SERVER_URL"),
            username: env_value("RDLM_USERNAME"),
            password: env_value("RDLM_PASSWORD"),
        }
    }

    /// `self` where set, `fallback` otherwise.
    pub fn or(self, fallback: Overrides) -> Self {
        Self {
            server_url: self.server_url.or(fallback.server_url),
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
        }
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub context: ConnectionContext,
    pub timeout: Duration,
    pub upload_limit: usize,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the explicit config file, or `./rdlm.json`, or the user config
    /// directory's `rdlm.json`. Only an explicit path is required to exist.
    pub fn load(path: Option<&str>) -> Result<Config, MigrateError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => default_locations().into_iter().find(|path| path.exists()),
        };
        let Some(config_path) = config_path else {
            return Ok(Config::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MigrateError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| MigrateError::ConfigParse(err.to_string()))
    }

    pub fn resolve(path: Option<&str>, overrides: Overrides) -> Result<Settings, MigrateError> {
        let config = Self::load(path)?;
        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(config: Config, overrides: Overrides) -> Result<Settings, MigrateError> {
        let server_url = overrides
            .server_url
            .or(config.server_url)
            .ok_or(MigrateError::MissingSetting("server_url"))?;
        let username = overrides
            .username
            .or(config.username)
            .ok_or(MigrateError::MissingSetting("username"))?;
        let password = overrides
            .password
            .or(config.password)
            .ok_or(MigrateError::MissingSetting("password"))?;

        Ok(Settings {
            context: ConnectionContext::new(&server_url, username, password)?,
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            upload_limit: config.upload_limit.unwrap_or(DEFAULT_UPLOAD_LIMIT),
        })
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dirs) = ProjectDirs::from("", "", "rdlm") {
        locations.push(dirs.config_dir().join(CONFIG_FILE));
    }
    locations
}
