//! Minimal embedding example for feedpoll-core
//!
//! An application supplies its own fetcher, consumes notifications from a
//! channel, and owns the poll lifecycle of each source.

use feedpoll_core::traits::FeedFetcher;
use feedpoll_core::{
    ChannelSink, FeedEngine, FeedPollConfig, FeedSource, MemoryWatermarkStore, Result,
    SourceConfig,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Fetcher that publishes one more entry on every request
struct GrowingFeed {
    requests: AtomicUsize,
}

impl GrowingFeed {
    fn new() -> Self {
        Self {
            requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl FeedFetcher for GrowingFeed {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        let published = self.requests.fetch_add(1, Ordering::SeqCst) + 1;

        let mut body = String::from("<rss version=\"2.0\"><channel><title>Embedded</title>");
        for n in (1..=published).rev() {
            body.push_str(&format!(
                "<item><title>Entry {n}</title><link>https://example.com/{n}</link>\
                 <pubDate>Mon, 01 Jan 2024 00:{n:02}:00 +0000</pubDate></item>"
            ));
        }
        body.push_str("</channel></rss>");
        Ok(body.into_bytes())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let mut config = FeedPollConfig::new().with_source(SourceConfig::new(
        "embedded",
        "https://example.com/rss",
    ));
    config.engine.poll_interval_secs = 1;

    let (sink, mut notifications) = ChannelSink::new(64);
    let (engine, _events) = FeedEngine::new(
        Arc::new(GrowingFeed::new()),
        Arc::new(sink),
        Arc::new(MemoryWatermarkStore::new()),
        config,
    )?;

    let handle = engine.start_source(FeedSource::new("embedded", "https://example.com/rss"));

    // Each tick after the first finds exactly one new entry
    let consumer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            println!(
                "[{}] {}: {} <{}>",
                notification.source_identity,
                notification.channel_title,
                notification.subject,
                notification.link
            );
        }
    });

    tokio::time::sleep(Duration::from_millis(3500)).await;
    handle.stop().await;

    // Dropping the engine closes the sink, which ends the consumer
    drop(engine);
    let _ = consumer.await;

    Ok(())
}
