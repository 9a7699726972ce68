// # Channel Sink
//
// Forwards notifications into a bounded tokio channel so an embedding
// application can consume them on its own task.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Error;
use crate::traits::notification_sink::{Notification, NotificationSink};

/// Notification sink backed by a bounded mpsc channel
///
/// Delivery never waits: a full channel drops the notification and reports
/// a sink error, as does a channel whose receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver that yields its notifications
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn notify(&self, notification: &Notification) -> Result<(), Error> {
        self.tx.try_send(notification.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::sink("notification channel full"),
            mpsc::error::TrySendError::Closed(_) => Error::sink("notification receiver dropped"),
        })
    }

    fn sink_name(&self) -> &'static str {
        "channel"
    }
}
