// # Tracing Sink
//
// Logs every notification at info level. This is the daemon's default
// surface when no other consumer is wired in.

use async_trait::async_trait;

use crate::Error;
use crate::traits::notification_sink::{Notification, NotificationSink};

/// Notification sink that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(
            source = %notification.source_identity,
            channel = %notification.channel_title,
            link = %notification.link,
            "{}",
            notification.subject
        );
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "tracing"
    }
}
