//! HTTP client for the chat-log service.
//!
//!   GET  <base>/channel/<c>/user/<u>/?reverse   announcer lines, newest first
//!   HEAD <base>/channel/<c>?raw                 redirects to /channel/<c>/<y>/<m>/<d>
//!   GET  <base>/channel/<c>?raw&offset=<n>      raw IRC lines from line n, 404 = nothing new

use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode};
use songq_core::config::LogsConfig;
use songq_core::day_key::DayKey;
use songq_core::error::{Error, Result};
use tracing::debug;

#[derive(Clone)]
pub struct LogClient {
    client: Client,
    base_url: String,
    channel: String,
    announcer: String,
}

impl LogClient {
    pub fn new(config: &LogsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            // The channel root redirects to today's shard
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("failed to build reqwest client for the log service")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            channel: config.channel.clone(),
            announcer: config.announcer.clone(),
        })
    }

    /// Ask the log service which day it is currently writing.
    pub async fn resolve_current_day(&self) -> Result<DayKey> {
        let url = format!("{}/channel/{}?raw", self.base_url, self.channel);
        let response = self.client.head(&url).send().await.map_err(network)?;
        let response = response.error_for_status().map_err(network)?;
        let final_url = response.url();
        debug!("logs: {} resolved to {}", url, final_url);
        DayKey::from_log_path(final_url.path())
    }

    /// The announcer's log for the channel, newest line first.
    pub async fn announcer_lines(&self) -> Result<String> {
        let url = format!(
            "{}/channel/{}/user/{}/?reverse",
            self.base_url, self.channel, self.announcer
        );
        let response = self.client.get(&url).send().await.map_err(network)?;
        let response = response.error_for_status().map_err(network)?;
        response.text().await.map_err(network)
    }

    /// Channel log lines from `offset` on, or `None` when there are none yet.
    pub async fn channel_suffix(&self, offset: u64) -> Result<Option<String>> {
        let url = format!(
            "{}/channel/{}?raw&offset={}",
            self.base_url, self.channel, offset
        );
        let response = self.client.get(&url).send().await.map_err(network)?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("logs: 404 at offset {}", offset);
            return Ok(None);
        }
        let response = response.error_for_status().map_err(network)?;
        let text = response.text().await.map_err(network)?;
        Ok(Some(text))
    }
}

fn network(e: reqwest::Error) -> Error {
    Error::Network(e.to_string())
}
