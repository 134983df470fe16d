//! Session configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use quotemark_core::defaults;
use quotemark_core::Error;

/// What to do with a generator response that arrives after a newer request
/// was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Discard the response entirely, history included.
    #[default]
    Drop,
    /// Append the answer to history but never touch the highlight.
    Append,
}

impl FromStr for StalePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "append" => Ok(Self::Append),
            _ => Err(Error::Config(format!("Invalid stale policy: {}", s))),
        }
    }
}

impl fmt::Display for StalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => write!(f, "drop"),
            Self::Append => write!(f, "append"),
        }
    }
}

/// Configuration for a grounding session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Delay between the scroll command and the highlight command.
    pub scroll_settle_ms: u64,
    /// Deadline for one generator request.
    pub gen_timeout_secs: u64,
    pub stale_policy: StalePolicy,
    /// Capacity of the session event bus.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scroll_settle_ms: defaults::SCROLL_SETTLE_MS,
            gen_timeout_secs: defaults::GEN_TIMEOUT_SECS,
            stale_policy: StalePolicy::default(),
            event_capacity: defaults::EVENT_BUS_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUOTEMARK_SCROLL_SETTLE_MS` | `350` | Scroll settle delay |
    /// | `QUOTEMARK_GEN_TIMEOUT_SECS` | `120` | Generator deadline |
    /// | `QUOTEMARK_STALE_POLICY` | `drop` | `drop` or `append` |
    /// | `QUOTEMARK_EVENT_CAPACITY` | `256` | Event bus buffer |
    pub fn from_env() -> Result<Self, Error> {
        let scroll_settle_ms = std::env::var("QUOTEMARK_SCROLL_SETTLE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SCROLL_SETTLE_MS);

        let gen_timeout_secs = std::env::var("QUOTEMARK_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::GEN_TIMEOUT_SECS)
            .max(1);

        let stale_policy = match std::env::var("QUOTEMARK_STALE_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => StalePolicy::default(),
        };

        let event_capacity = std::env::var("QUOTEMARK_EVENT_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::EVENT_BUS_CAPACITY)
            .max(1);

        Ok(Self {
            scroll_settle_ms,
            gen_timeout_secs,
            stale_policy,
            event_capacity,
        })
    }

    pub fn with_scroll_settle_ms(mut self, ms: u64) -> Self {
        self.scroll_settle_ms = ms;
        self
    }

    pub fn with_gen_timeout_secs(mut self, secs: u64) -> Self {
        self.gen_timeout_secs = secs;
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn gen_timeout(&self) -> Duration {
        Duration::from_secs(self.gen_timeout_secs)
    }
}
