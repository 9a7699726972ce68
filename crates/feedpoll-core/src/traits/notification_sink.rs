// # Notification Sink Trait
//
// Defines where notifications for new feed entries are delivered.
//
// The engine calls `notify` once per new entry. Deliveries are independent:
// a failure is logged and the next entry is still delivered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A notification for one new feed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Entry title
    pub subject: String,
    /// Title of the channel the entry came from
    pub channel_title: String,
    /// Identity of the feed source that produced the entry
    pub source_identity: String,
    /// Entry link
    pub link: String,
}

/// Trait for notification sink implementations
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a single notification
    ///
    /// The engine does not retry failed deliveries.
    async fn notify(&self, notification: &Notification) -> Result<(), crate::Error>;

    /// Name used in logs
    fn sink_name(&self) -> &'static str {
        "sink"
    }
}
