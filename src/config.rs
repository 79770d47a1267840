//! Application configuration management.
//!
//! Configuration is stored at `~/.config/todoterm/config.json` and holds the
//! service URL plus the last username used, so repeat logins only ask for a
//! password. The persisted bearer token lives next to it (see
//! [`crate::auth::TokenStore`]); nothing else is kept on disk.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "todoterm";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Hosted instance used when neither the CLI flag, the environment, nor the
/// config file names a service URL
pub const DEFAULT_API_URL: &str = "https://todo-server-9nwr.onrender.com";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Resolve the service URL: explicit override (CLI flag or env) wins,
    /// then the config file, then the hosted default.
    pub fn resolve_api_url(&self, override_url: Option<String>) -> String {
        override_url
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Directory holding the config file and the persisted token
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_api_url_precedence() {
        let config = Config {
            api_url: Some("https://todo.internal".to_string()),
            last_username: None,
        };
        assert_eq!(
            config.resolve_api_url(Some("https://localhost:3000".to_string())),
            "https://localhost:3000"
        );
        assert_eq!(config.resolve_api_url(None), "https://todo.internal");
        assert_eq!(Config::default().resolve_api_url(None), DEFAULT_API_URL);
    }
}
