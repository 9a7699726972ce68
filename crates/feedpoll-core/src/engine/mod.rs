//! Feed polling engine
//!
//! The FeedEngine is responsible for:
//! - Fetching each configured feed via FeedFetcher
//! - Decoding the body and filtering entries against the watermark
//! - Delivering one notification per new entry via NotificationSink
//! - Advancing the watermark in WatermarkStore
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ Poll timer   │─── tick ───┐
//! └──────────────┘            │
//!                             ▼
//!                     ┌──────────────┐
//!                     │  FeedEngine  │
//!                     └──────────────┘
//!                             │
//!     ┌───────────────┬───────┴────────┬────────────────┐
//!     ▼               ▼                ▼                ▼
//! ┌─────────┐   ┌───────────┐   ┌──────────────┐  ┌───────────┐
//! │ Fetcher │   │ Decoder + │   │     Sink     │  │ Watermark │
//! │ (fetch) │   │  Filter   │   │   (notify)   │  │   Store   │
//! └─────────┘   └───────────┘   └──────────────┘  └───────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Read the source's watermark from the store
//! 2. Fetch the feed (bounded by the fetch timeout)
//! 3. Decode and filter; feed and network errors end the tick quietly
//! 4. Notify once per new entry
//! 5. Advance the stored watermark if it grew

mod scheduler;

pub use scheduler::SourceHandle;

use crate::config::{DeliveryOrder, EngineConfig, FeedPollConfig, SourceConfig};
use crate::decoder;
use crate::error::{DecodeError, Error, Result};
use crate::filter::filter_with_tolerance;
use crate::traits::{FeedFetcher, Notification, NotificationSink, WatermarkStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the FeedEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started its configured sources
    Started { sources_count: usize },

    /// A source's poll timer was registered
    SourceStarted { source_id: String },

    /// A source's poll timer was removed
    SourceStopped { source_id: String },

    /// A tick ended without fetching or without content
    PollSkipped { source_id: String, reason: String },

    /// A tick ended because of a fetch, decode, or storage failure
    PollFailed { source_id: String, error: String },

    /// A notification was accepted by the sink
    EntryDelivered {
        source_id: String,
        subject: String,
        link: String,
    },

    /// The stored watermark moved forward
    WatermarkAdvanced {
        source_id: String,
        previous: i64,
        current: i64,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// A polled feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    /// Identity used for the watermark key and as the notification source
    pub id: String,
    /// Feed URL; empty disables polling
    pub url: String,
}

impl FeedSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

impl From<&SourceConfig> for FeedSource {
    fn from(config: &SourceConfig) -> Self {
        Self::new(config.id.clone(), config.url.clone())
    }
}

/// Caller-owned state for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceState {
    pub source: FeedSource,
    /// Publish time of the newest delivered entry
    pub watermark: i64,
}

impl SourceState {
    pub fn new(source: FeedSource, watermark: i64) -> Self {
        Self { source, watermark }
    }
}

/// How a single poll ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// No feed URL configured; nothing was fetched
    Disabled,
    /// The fetch failed or timed out
    FetchFailed(String),
    /// The fetch returned no content
    EmptyBody,
    /// The body was not well-formed markup
    MalformedFeed(String),
    /// The markup had no channel container
    InvalidFeedStructure,
    /// The feed was decoded and filtered
    Completed { new_entries: usize },
}

impl PollStatus {
    /// Whether the poll reached the filter
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub status: PollStatus,
    /// One notification per new entry, in delivery order
    pub notifications: Vec<Notification>,
    /// Updated watermark; never below the input watermark
    pub watermark: i64,
}

impl PollOutcome {
    fn unchanged(status: PollStatus, watermark: i64) -> Self {
        Self {
            status,
            notifications: Vec::new(),
            watermark,
        }
    }
}

struct EngineInner {
    fetcher: Arc<dyn FeedFetcher>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn WatermarkStore>,
    sources: Vec<SourceConfig>,
    config: EngineConfig,
    event_tx: mpsc::Sender<EngineEvent>,
}

/// Feed polling engine
///
/// Cloning is cheap; clones share collaborators and the event channel.
///
/// ## Lifecycle
///
/// 1. Create with [`FeedEngine::new()`]
/// 2. Either call [`FeedEngine::run()`] to poll every configured source
///    until Ctrl-C, or drive sources individually with
///    [`FeedEngine::start_source()`] / [`SourceHandle::stop()`]
/// 3. Single polls are available through [`FeedEngine::poll_once()`] and
///    [`FeedEngine::tick()`]
#[derive(Clone)]
pub struct FeedEngine {
    inner: Arc<EngineInner>,
}

impl FeedEngine {
    /// Create a new feed engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn WatermarkStore>,
        config: FeedPollConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            inner: Arc::new(EngineInner {
                fetcher,
                sink,
                store,
                sources: config.sources,
                config: config.engine,
                event_tx: tx,
            }),
        };

        Ok((engine, rx))
    }

    /// Configured sources
    pub fn sources(&self) -> &[SourceConfig] {
        &self.inner.sources
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Run one poll without side effects on the sink or store
    ///
    /// Network and feed errors are contained: they are logged and reported in
    /// [`PollOutcome::status`] with an unchanged watermark.
    pub async fn poll_once(&self, source: &FeedSource, watermark: i64) -> PollOutcome {
        if source.url.is_empty() {
            debug!("Source {} has no feed URL, skipping", source.id);
            return PollOutcome::unchanged(PollStatus::Disabled, watermark);
        }

        let body = match self.fetch(&source.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Fetch of {} for {} failed: {}", source.url, source.id, e);
                return PollOutcome::unchanged(PollStatus::FetchFailed(e.to_string()), watermark);
            }
        };

        if body.is_empty() {
            debug!("Empty response from {} for {}", source.url, source.id);
            return PollOutcome::unchanged(PollStatus::EmptyBody, watermark);
        }

        let feed = match decoder::decode(&body) {
            Ok(feed) => feed,
            Err(DecodeError::MalformedFeed(reason)) => {
                error!("Could not load feed {} for {}: {}", source.url, source.id, reason);
                return PollOutcome::unchanged(PollStatus::MalformedFeed(reason), watermark);
            }
            Err(DecodeError::InvalidFeedStructure) => {
                warn!("Invalid feed {} for {}: no channel", source.url, source.id);
                return PollOutcome::unchanged(PollStatus::InvalidFeedStructure, watermark);
            }
        };

        if feed.entries.is_empty() {
            info!("No items in {} for {}", source.url, source.id);
        }
        if feed.undated_items > 0 {
            debug!(
                "Skipped {} undated item(s) in {}",
                feed.undated_items, source.url
            );
        }

        let filtered =
            filter_with_tolerance(feed.entries, watermark, self.inner.config.old_entry_tolerance);

        let mut notifications: Vec<Notification> = filtered
            .new_entries
            .into_iter()
            .map(|entry| Notification {
                subject: entry.title,
                channel_title: feed.title.clone(),
                source_identity: source.id.clone(),
                link: entry.link,
            })
            .collect();

        if self.inner.config.delivery_order == DeliveryOrder::OldestFirst {
            notifications.reverse();
        }

        debug!(
            "Source {}: {} new of {} inspected, watermark {} -> {}",
            source.id,
            notifications.len(),
            filtered.inspected,
            watermark,
            filtered.watermark
        );

        PollOutcome {
            status: PollStatus::Completed {
                new_entries: notifications.len(),
            },
            notifications,
            watermark: filtered.watermark,
        }
    }

    /// Run one poll tick for caller-owned state
    ///
    /// Delivers every notification, then persists the watermark only when it
    /// grew. A sink failure is logged and does not stop later deliveries or
    /// the watermark update. Only store failures are returned.
    pub async fn tick(&self, state: &mut SourceState) -> Result<PollOutcome> {
        let outcome = self.poll_once(&state.source, state.watermark).await;
        let source_id = &state.source.id;

        match &outcome.status {
            PollStatus::Disabled => self.emit_event(EngineEvent::PollSkipped {
                source_id: source_id.clone(),
                reason: "no feed URL".to_string(),
            }),
            PollStatus::EmptyBody => self.emit_event(EngineEvent::PollSkipped {
                source_id: source_id.clone(),
                reason: "empty response".to_string(),
            }),
            PollStatus::FetchFailed(e) | PollStatus::MalformedFeed(e) => {
                self.emit_event(EngineEvent::PollFailed {
                    source_id: source_id.clone(),
                    error: e.clone(),
                })
            }
            PollStatus::InvalidFeedStructure => self.emit_event(EngineEvent::PollFailed {
                source_id: source_id.clone(),
                error: DecodeError::InvalidFeedStructure.to_string(),
            }),
            PollStatus::Completed { .. } => {}
        }

        for notification in &outcome.notifications {
            match self.inner.sink.notify(notification).await {
                Ok(()) => {
                    info!(
                        "New entry from {}: '{}' ({})",
                        source_id, notification.subject, notification.link
                    );
                    self.emit_event(EngineEvent::EntryDelivered {
                        source_id: source_id.clone(),
                        subject: notification.subject.clone(),
                        link: notification.link.clone(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Sink {} failed to deliver '{}': {}",
                        self.inner.sink.sink_name(),
                        notification.subject,
                        e
                    );
                }
            }
        }

        if outcome.watermark > state.watermark {
            let moved = self
                .inner
                .store
                .advance_watermark(source_id, outcome.watermark)
                .await?;

            if moved {
                info!(
                    "Watermark for {} advanced {} -> {}",
                    source_id, state.watermark, outcome.watermark
                );
                self.emit_event(EngineEvent::WatermarkAdvanced {
                    source_id: source_id.clone(),
                    previous: state.watermark,
                    current: outcome.watermark,
                });
                state.watermark = outcome.watermark;
            } else {
                // The store already holds a newer watermark
                let stored = self.inner.store.get_watermark(source_id).await?;
                debug!(
                    "Watermark for {} already at {}, not lowering to {}",
                    source_id, stored, outcome.watermark
                );
                state.watermark = state.watermark.max(stored);
            }
        }

        Ok(outcome)
    }

    /// Run one poll tick using the watermark held by the store
    pub async fn poll_source(&self, source: &FeedSource) -> Result<PollOutcome> {
        let watermark = self.inner.store.get_watermark(&source.id).await?;
        let mut state = SourceState::new(source.clone(), watermark);
        self.tick(&mut state).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let limit = self.inner.config.fetch_timeout();
        match tokio::time::timeout(limit, self.inner.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(limit.as_secs())),
        }
    }

    /// Emit an engine event
    ///
    /// Events are dropped with a warning when the channel is full.
    fn emit_event(&self, event: EngineEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.inner.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
