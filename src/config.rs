// src/config.rs
use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::chunker::DEFAULT_MAX_CHARS;
use crate::publish::mastodon::MastodonCredentials;
use crate::scheduler::parse_time_of_day;

const ENV_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";
pub const DEFAULT_FEED_BASE_URL: &str = "https://agg.rocketalert.live";
pub const DEFAULT_SUMMARY_AT: &str = "16:55";

/// Everything the relay needs at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub feed_base_url: String,
    pub custom_header_key: String,
    pub custom_header_value: String,
    pub mastodon: MastodonCredentials,
    pub post_max_chars: usize,
    pub publish_interval: Duration,
    pub scheduler_tick: Duration,
    pub summary_at: NaiveTime,
}

/// Optional `[relay]` table in the TOML file named by `RELAY_CONFIG_PATH`.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tunables {
    pub feed_base_url: Option<String>,
    pub post_max_chars: Option<usize>,
    pub publish_interval_secs: Option<u64>,
    pub scheduler_tick_secs: Option<u64>,
    pub daily_summary_at: Option<String>,
}

#[derive(Deserialize)]
struct TomlFile {
    #[serde(default)]
    relay: Tunables,
}

impl RelayConfig {
    /// Feed stream endpoint.
    pub fn feed_url(&self) -> String {
        format!(
            "{}/api/v1/alerts/real-time",
            self.feed_base_url.trim_end_matches('/')
        )
    }

    /// Read config from the process environment, with optional TOML tunables underneath.
    pub fn from_env() -> Result<Self> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => load_tunables_from(Path::new(&p))?,
            Err(_) => Tunables::default(),
        };
        Self::from_lookup(|k| std::env::var(k).ok(), file)
    }

    /// Build from a key lookup. Looked-up values win over `file`.
    pub fn from_lookup<F>(lookup: F, file: Tunables) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |k: &str| -> Result<String> {
            lookup(k)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required env var {k}"))
        };
        let parsed = |k: &str| -> Result<Option<u64>> {
            lookup(k)
                .map(|v| v.trim().parse::<u64>().with_context(|| format!("{k} must be an integer")))
                .transpose()
        };

        let mastodon = MastodonCredentials {
            base_url: required("MASTO_BASEURL")?,
            client_id: required("MASTO_CLIENTID")?,
            client_secret: required("MASTO_CLIENTSECRET")?,
            username: required("MASTO_USER")?,
            password: required("MASTO_PASSWORD")?,
        };

        let post_max_chars = match parsed("POST_MAX_CHARS")? {
            Some(n) => n as usize,
            None => file.post_max_chars.unwrap_or(DEFAULT_MAX_CHARS),
        };
        if post_max_chars == 0 {
            return Err(anyhow!("POST_MAX_CHARS must be greater than zero"));
        }

        let publish_secs = parsed("PUBLISH_INTERVAL_SECS")?
            .or(file.publish_interval_secs)
            .unwrap_or(1)
            .max(1);
        let tick_secs = parsed("SCHEDULER_TICK_SECS")?
            .or(file.scheduler_tick_secs)
            .unwrap_or(1)
            .max(1);

        let summary_at = lookup("DAILY_SUMMARY_AT")
            .or(file.daily_summary_at)
            .unwrap_or_else(|| DEFAULT_SUMMARY_AT.to_string());

        Ok(Self {
            feed_base_url: lookup("FEED_BASE_URL")
                .or(file.feed_base_url)
                .unwrap_or_else(|| DEFAULT_FEED_BASE_URL.to_string()),
            custom_header_key: required("CUSTOM_HEADER_KEY")?,
            custom_header_value: required("CUSTOM_HEADER_VALUE")?,
            mastodon,
            post_max_chars,
            publish_interval: Duration::from_secs(publish_secs),
            scheduler_tick: Duration::from_secs(tick_secs),
            summary_at: parse_time_of_day(&summary_at).context("DAILY_SUMMARY_AT")?,
        })
    }
}

/// Load the `[relay]` tunables from a TOML file.
pub fn load_tunables_from(path: &Path) -> Result<Tunables> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading relay config from {}", path.display()))?;
    let parsed: TomlFile = toml::from_str(&content)
        .with_context(|| format!("parsing relay config {}", path.display()))?;
    Ok(parsed.relay)
}
