//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use loom_session::{ReconnectConfig, StudioConfig};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8321";

/// Configuration for loom
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dev server base URL
    pub server_url: Option<String>,
    /// Agent to open on startup
    pub agent: Option<String>,
    /// Talk to the built-in assistant instead of project agents
    pub assistant: Option<bool>,
    /// Delay before reconnecting a dropped channel
    pub reconnect_delay_ms: Option<u64>,
    /// Interval between liveness probes while the server is down
    pub status_poll_ms: Option<u64>,
    /// Path probed to decide whether the server is up
    pub status_path: Option<String>,
    /// Where conversations are stored
    pub storage_path: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("loom")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("LOOM_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`; a missing or broken file yields the defaults
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            assistant: Some(false),
            reconnect_delay_ms: Some(2000),
            status_poll_ms: Some(3000),
            status_path: Some(loom_session::project::PROJECT_PATH.to_string()),
            ..Default::default()
        };

        default_config.save_to(&path)?;
        Ok(path)
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Engine settings for this config
    pub fn studio_config(&self) -> StudioConfig {
        let defaults = StudioConfig::default();
        let mut reconnect = ReconnectConfig::default();
        if let Some(ms) = self.reconnect_delay_ms {
            reconnect.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.status_poll_ms {
            reconnect.status_poll_interval = Duration::from_millis(ms);
        }

        StudioConfig {
            base_url: self.server_url().to_string(),
            assistant: self.assistant.unwrap_or(false),
            default_agent: self.agent.clone(),
            reconnect,
            status_path: self.status_path.clone().unwrap_or(defaults.status_path),
        }
    }

    /// Storage file, if one is configured
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage_path.as_deref().map(expand_home)
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# loom configuration file
# Place at ~/.config/loom/config.toml (Linux) or set LOOM_CONFIG_PATH

# Dev server base URL
server_url = "http://127.0.0.1:8321"

# Agent to open on startup (defaults to the first agent in the project)
# agent = "main"

# Talk to the built-in studio assistant instead of project agents
assistant = false

# Delay before reconnecting a dropped channel
reconnect_delay_ms = 2000

# How often to probe the server while it is unreachable
status_poll_ms = 3000

# Endpoint probed to decide whether the server is up
status_path = "/api/project"

# Conversation storage (defaults to the platform data directory)
# storage_path = "~/.local/share/loom/storage.json"
"#
}
