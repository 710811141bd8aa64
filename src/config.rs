use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the poller reads a batch returned by `getUpdates`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Only the newest update of each batch is considered.
    #[default]
    Tail,
    /// Every update newer than the last one seen is emitted, oldest first.
    Suffix,
}

impl std::fmt::Display for BatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchMode::Tail => write!(f, "tail"),
            BatchMode::Suffix => write!(f, "suffix"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_database_config")]
    pub database: DatabaseConfig,
    #[serde(default = "default_poller_config")]
    pub poller: PollerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    /// Bot API base URL including the token, e.g. `https://api.telegram.org/bot<TOKEN>`
    #[serde(default)]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    /// Delay between two `getUpdates` calls, also used after a failed fetch.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub batch_mode: BatchMode,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data.db")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_database_config() -> DatabaseConfig {
    DatabaseConfig {
        path: default_db_path(),
    }
}

fn default_poller_config() -> PollerConfig {
    PollerConfig {
        poll_interval_ms: default_poll_interval_ms(),
        batch_mode: BatchMode::default(),
    }
}

impl PollerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Address the HTTP front door binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Load the config file if present, apply environment overrides
    /// (`BOT_URL`, `PORT`, `DATABASE_PATH`) and validate the result.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?
        } else {
            String::new()
        };

        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    /// Overlay values looked up by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BOT_URL").filter(|v| !v.trim().is_empty()) {
            self.telegram.api_base_url = url;
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", port))?;
        }
        if let Some(path) = lookup("DATABASE_PATH").filter(|v| !v.trim().is_empty()) {
            self.database.path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        let url = self.telegram.api_base_url.trim().trim_end_matches('/');
        if url.is_empty() {
            anyhow::bail!("Telegram API base URL is not set (use BOT_URL or [telegram] api_base_url)");
        }
        self.telegram.api_base_url = url.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.path, PathBuf::from("data.db"));
        assert_eq!(config.poller.poll_interval_ms, 1000);
        assert_eq!(config.poller.batch_mode, BatchMode::Tail);
        assert!(config.telegram.api_base_url.is_empty());
    }

    #[test]
    fn test_full_file() {
        let config = Config::parse(
            r#"
            [telegram]
            api_base_url = "https://api.telegram.org/bot123:abc"

            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            path = "bridge.db"

            [poller]
            poll_interval_ms = 250
            batch_mode = "suffix"
            "#,
        )
        .unwrap();
        assert_eq!(config.telegram.api_base_url, "https://api.telegram.org/bot123:abc");
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.database.path, PathBuf::from("bridge.db"));
        assert_eq!(config.poller.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.poller.batch_mode, BatchMode::Suffix);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::parse(
            r#"
            [telegram]
            api_base_url = "http://from-file"
            "#,
        )
        .unwrap();
        config
            .apply_overrides(env(&[
                ("BOT_URL", "http://from-env/bot1"),
                ("PORT", "8181"),
                ("DATABASE_PATH", "/tmp/x.db"),
            ]))
            .unwrap();
        assert_eq!(config.telegram.api_base_url, "http://from-env/bot1");
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.database.path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = Config::parse("").unwrap();
        assert!(config.apply_overrides(env(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_missing_base_url_is_startup_error() {
        let mut config = Config::parse("").unwrap();
        config.apply_overrides(env(&[])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let mut config = Config::parse("").unwrap();
        config
            .apply_overrides(env(&[("BOT_URL", "http://localhost:1234/bot1/")]))
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.telegram.api_base_url, "http://localhost:1234/bot1");
    }

    #[test]
    fn test_unknown_batch_mode_rejected() {
        let err = Config::parse(
            r#"
            [poller]
            batch_mode = "everything"
            "#,
        );
        assert!(err.is_err());
    }
}
