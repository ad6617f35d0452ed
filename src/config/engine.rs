//! Engine and live-feed configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Live-feed tuning for consumers of session events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// First reconnect delay.
    pub reconnect_base_ms: u64,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_ms: u64,
    /// Consecutive failures before falling back to polling.
    pub degrade_after_failures: u32,
    /// Snapshot polling interval while degraded.
    pub poll_interval_secs: u64,
    /// Pause after the backend reports rate limiting.
    pub rate_limit_cooldown_secs: u64,
    /// Quiet period that closes a burst of events.
    pub coalesce_quiet_ms: u64,
    /// Longest a burst may hold back a re-fetch, counted from its first event.
    pub coalesce_max_wait_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_base_ms: 500,
            reconnect_max_ms: 30_000,
            degrade_after_failures: 3,
            poll_interval_secs: 15,
            rate_limit_cooldown_secs: 45,
            coalesce_quiet_ms: 200,
            coalesce_max_wait_ms: 1_000,
        }
    }
}

impl FeedConfig {
    /// Validate feed values.
    pub fn validate(&self) -> Result<(), String> {
        if self.reconnect_base_ms == 0 {
            return Err("reconnect_base_ms must be greater than 0".into());
        }
        if self.reconnect_max_ms < self.reconnect_base_ms {
            return Err("reconnect_max_ms must be at least reconnect_base_ms".into());
        }
        if self.degrade_after_failures == 0 {
            return Err("degrade_after_failures must be greater than 0".into());
        }
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be greater than 0".into());
        }
        if self.rate_limit_cooldown_secs == 0 {
            return Err("rate_limit_cooldown_secs must be greater than 0".into());
        }
        if self.coalesce_quiet_ms == 0 {
            return Err("coalesce_quiet_ms must be greater than 0".into());
        }
        if self.coalesce_max_wait_ms < self.coalesce_quiet_ms {
            return Err("coalesce_max_wait_ms must be at least coalesce_quiet_ms".into());
        }
        Ok(())
    }

    /// First reconnect delay.
    #[must_use]
    pub const fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    /// Reconnect delay ceiling.
    #[must_use]
    pub const fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    /// Polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Rate-limit pause.
    #[must_use]
    pub const fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    /// Coalescing quiet period.
    #[must_use]
    pub const fn coalesce_quiet(&self) -> Duration {
        Duration::from_millis(self.coalesce_quiet_ms)
    }

    /// Cap on how long a burst defers its re-fetch.
    #[must_use]
    pub const fn coalesce_max_wait(&self) -> Duration {
        Duration::from_millis(self.coalesce_max_wait_ms)
    }
}

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Commit-delay window for guest selections.
    pub commit_delay_ms: u64,
    /// How often the guest scheduler looks for expired windows.
    pub scheduler_tick_ms: u64,
    /// Per-session broadcast buffer.
    pub event_capacity: usize,
    /// Audit events kept by the in-memory sink.
    pub audit_capacity: usize,
    /// Consumer live-feed settings.
    pub feed: FeedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commit_delay_ms: 5000,
            scheduler_tick_ms: 250,
            event_capacity: 256,
            audit_capacity: 1024,
            feed: FeedConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate every value, including the feed section.
    pub fn validate(&self) -> Result<(), String> {
        if self.commit_delay_ms == 0 {
            return Err("commit_delay_ms must be greater than 0".into());
        }
        if self.scheduler_tick_ms == 0 {
            return Err("scheduler_tick_ms must be greater than 0".into());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".into());
        }
        if self.audit_capacity == 0 {
            return Err("audit_capacity must be greater than 0".into());
        }
        self.feed.validate().map_err(|e| format!("feed invalid: {e}"))
    }

    /// Parse configuration from a JSON string and validate. Missing fields take defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `.env` if present, then read `JAM_*` variables over the defaults.
    pub fn from_env() -> Result<Self, String> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(format!(".env error: {e}"));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup over the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut cfg = Self::default();
        override_from(&lookup, "JAM_COMMIT_DELAY_MS", &mut cfg.commit_delay_ms)?;
        override_from(&lookup, "JAM_SCHEDULER_TICK_MS", &mut cfg.scheduler_tick_ms)?;
        override_from(&lookup, "JAM_EVENT_CAPACITY", &mut cfg.event_capacity)?;
        override_from(&lookup, "JAM_AUDIT_CAPACITY", &mut cfg.audit_capacity)?;
        let feed = &mut cfg.feed;
        override_from(&lookup, "JAM_FEED_RECONNECT_BASE_MS", &mut feed.reconnect_base_ms)?;
        override_from(&lookup, "JAM_FEED_RECONNECT_MAX_MS", &mut feed.reconnect_max_ms)?;
        override_from(&lookup, "JAM_FEED_DEGRADE_AFTER", &mut feed.degrade_after_failures)?;
        override_from(&lookup, "JAM_FEED_POLL_SECS", &mut feed.poll_interval_secs)?;
        override_from(
            &lookup,
            "JAM_FEED_RATE_LIMIT_COOLDOWN_SECS",
            &mut feed.rate_limit_cooldown_secs,
        )?;
        override_from(&lookup, "JAM_FEED_COALESCE_MS", &mut feed.coalesce_quiet_ms)?;
        override_from(
            &lookup,
            "JAM_FEED_COALESCE_MAX_WAIT_MS",
            &mut feed.coalesce_max_wait_ms,
        )?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Commit-delay window.
    #[must_use]
    pub const fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }

    /// Scheduler tick interval.
    #[must_use]
    pub const fn scheduler_tick(&self) -> Duration {
        Duration::from_millis(self.scheduler_tick_ms)
    }
}

fn override_from<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> Result<(), String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{key}: cannot parse `{raw}`: {e}"))?;
    }
    Ok(())
}
