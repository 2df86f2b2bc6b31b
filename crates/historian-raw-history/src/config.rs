/*
[INPUT]:  YAML configuration file and CLI overrides
[OUTPUT]: Validated session script configuration
[POS]:    Configuration layer - connection, identities and sample layout
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use historian_adapter::{ClientConfig, Identity};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_URL: &str = "ws://localhost:8002/ws";
pub const DEFAULT_IDENTITIES: [&str; 2] = [
    "/System/Core/Examples/Demo Data/Process Data/DC4711",
    "/System/Core/Examples/Demo Data/Process Data/DC666",
];

/// Everything the session script needs; every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// WebSocket endpoint of the historian
    pub url: String,
    pub username: String,
    /// Usually supplied through `HISTORIAN_PASSWORD` instead of the file
    pub password: String,
    /// Item paths to write and read back
    pub identities: Vec<String>,
    /// Timestamp of the first generated sample
    pub start_time: DateTime<Utc>,
    /// Samples generated per identity
    pub samples: u32,
    pub interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: String::new(),
            password: String::new(),
            identities: DEFAULT_IDENTITIES.iter().map(|path| path.to_string()).collect(),
            start_time: default_start_time(),
            samples: 7,
            interval_ms: 1000,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

fn default_start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

impl ScriptConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.url).with_context(|| format!("invalid url '{}'", self.url))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            bail!("url '{}' must use ws:// or wss://", self.url);
        }
        if self.identities.is_empty() {
            bail!("at least one identity is required");
        }
        if let Some(position) = self.identities.iter().position(|path| path.trim().is_empty()) {
            bail!("identity #{} is empty", position + 1);
        }
        if self.samples == 0 {
            bail!("samples must be greater than zero");
        }
        if self.interval_ms == 0 {
            bail!("interval_ms must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        // Every generated timestamp lies before the read end.
        self.filtered_read_end_time()?;
        Ok(())
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.identities.iter().map(|path| Identity::new(path.as_str())).collect()
    }

    pub fn interval(&self) -> anyhow::Result<TimeDelta> {
        i64::try_from(self.interval_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .with_context(|| format!("interval_ms {} is out of range", self.interval_ms))
    }

    /// End of the unfiltered read: one interval past the last sample.
    pub fn read_end_time(&self) -> anyhow::Result<DateTime<Utc>> {
        let span = i32::try_from(self.samples)
            .ok()
            .and_then(|samples| self.interval().ok()?.checked_mul(samples));
        span.and_then(|span| self.start_time.checked_add_signed(span))
            .with_context(|| {
                format!(
                    "{} samples every {} ms from {} run past the supported time range",
                    self.samples, self.interval_ms, self.start_time
                )
            })
    }

    /// End of the filtered read, just short of the unfiltered end.
    pub fn filtered_read_end_time(&self) -> anyhow::Result<DateTime<Utc>> {
        self.read_end_time()?
            .checked_sub_signed(TimeDelta::milliseconds(2))
            .context("filtered read end is out of range")
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ClientConfig::default()
        }
    }
}
