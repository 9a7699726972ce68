//! Configuration types for the feed polling system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main feed polling configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedPollConfig {
    /// Feed sources to poll
    pub sources: Vec<SourceConfig>,

    /// Watermark store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl FeedPollConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source
    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    /// Validate the configuration
    ///
    /// An empty source list is allowed; the engine simply has nothing to do.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.is_empty() {
                return Err(crate::Error::config("Source id cannot be empty"));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate source id: {}",
                    source.id
                )));
            }
        }

        if let StateStoreConfig::File { path } = &self.state_store {
            if path.is_empty() {
                return Err(crate::Error::config("State file path cannot be empty"));
            }
        }

        self.engine.validate()
    }
}

/// Feed source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable identity used as the watermark key and notification source
    pub id: String,

    /// Feed URL; empty means the source is configured but disabled
    #[serde(default)]
    pub url: String,

    /// Whether the engine should schedule this source
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SourceConfig {
    /// Create an enabled source
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            enabled: true,
        }
    }

    /// Enable or disable the source
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Watermark store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// JSON file store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

/// Order in which a tick's new entries are handed to the sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOrder {
    /// Document order, newest entry first
    #[default]
    NewestFirst,
    /// Reverse document order, oldest new entry first
    OldestFirst,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between poll ticks of one source
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Upper bound on a single fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Consecutive old entries tolerated before the filter stops
    ///
    /// 0 stops at the first entry at or below the watermark, relying on the
    /// feed being ordered newest-first.
    #[serde(default)]
    pub old_entry_tolerance: usize,

    /// Emission order of new entries within one tick
    #[serde(default)]
    pub delivery_order: DeliveryOrder,

    /// Capacity of the engine event channel
    ///
    /// When full, events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("Fetch timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            old_entry_tolerance: 0,
            delivery_order: DeliveryOrder::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_cadence() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.old_entry_tolerance, 0);
        assert_eq!(config.delivery_order, DeliveryOrder::NewestFirst);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: FeedPollConfig = serde_json::from_str(
            r#"{
                "sources": [{ "id": "news", "url": "https://example.com/rss" }],
                "state_store": { "type": "file", "path": "/tmp/state.json" },
                "engine": { "delivery_order": "oldest_first" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.sources, vec![SourceConfig::new("news", "https://example.com/rss")]);
        assert_eq!(
            config.state_store,
            StateStoreConfig::File {
                path: "/tmp/state.json".to_string()
            }
        );
        assert_eq!(config.engine.delivery_order, DeliveryOrder::OldestFirst);
        assert_eq!(config.engine.poll_interval_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_and_empty_ids() {
        let dup = FeedPollConfig::new()
            .with_source(SourceConfig::new("a", "https://a"))
            .with_source(SourceConfig::new("a", "https://b"));
        assert!(dup.validate().is_err());

        let empty = FeedPollConfig::new().with_source(SourceConfig::new("", "https://a"));
        assert!(empty.validate().is_err());
    }

    #[test]
    fn empty_url_is_valid() {
        let config = FeedPollConfig::new().with_source(SourceConfig::new("idle", ""));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_durations() {
        let mut config = FeedPollConfig::new();
        config.engine.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = FeedPollConfig::new();
        config.engine.fetch_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
