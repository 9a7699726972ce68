//! Core traits for the feed polling system
//!
//! This module defines the abstract interfaces to the engine's collaborators.
//!
//! - [`FeedFetcher`]: Retrieve raw feed bodies over the network
//! - [`WatermarkStore`]: Persist the per-source watermark between polls
//! - [`NotificationSink`]: Deliver one notification per new entry

pub mod feed_fetcher;
pub mod notification_sink;
pub mod watermark_store;

pub use feed_fetcher::FeedFetcher;
pub use notification_sink::{Notification, NotificationSink};
pub use watermark_store::{WatermarkRecord, WatermarkStore};
