use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// JSON key-value file holding cursors, accumulators and the last match.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where the chat logs come from and what to look for in them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Bot account whose `🔊` lines announce the current song.
    #[serde(default = "default_announcer")]
    pub announcer: String,
    /// Channel-points reward that marks a song request.
    #[serde(default = "default_reward_id")]
    pub reward_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Day records this many days older than the current log day are removed.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_average_song_minutes")]
    pub average_song_minutes: f64,
}

impl LogsConfig {
    /// Tag carried by every request-reward line in the raw channel log.
    pub fn reward_marker(&self) -> String {
        format!("custom-reward-id={}", self.reward_id)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            channel: default_channel(),
            announcer: default_announcer(),
            reward_id: default_reward_id(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            average_song_minutes: default_average_song_minutes(),
        }
    }
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("state.json")
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8969
}

fn default_base_url() -> String {
    "https://logs.ivr.fi".to_string()
}

fn default_channel() -> String {
    "quin69".to_string()
}

fn default_announcer() -> String {
    "sheepfarmer".to_string()
}

fn default_reward_id() -> String {
    "c6a37c56-beaa-4752-90c8-e18efacfeaba".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    format!("songq/{}", env!("CARGO_PKG_VERSION"))
}

fn default_interval_secs() -> u64 {
    60
}

fn default_retention_days() -> i64 {
    2
}

fn default_average_song_minutes() -> f64 {
    3.28
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            http: HttpConfig::default(),
            logs: LogsConfig::default(),
            poll: PollConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}
