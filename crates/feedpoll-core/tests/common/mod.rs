//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal collaborators that record how the engine
//! uses them without doing real I/O.

#![allow(dead_code)]

use async_trait::async_trait;
use feedpoll_core::config::{FeedPollConfig, SourceConfig};
use feedpoll_core::error::{Error, Result};
use feedpoll_core::state::MemoryWatermarkStore;
use feedpoll_core::traits::{
    FeedFetcher, Notification, NotificationSink, WatermarkRecord, WatermarkStore,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted fetch result
#[derive(Debug, Clone)]
pub enum FetchScript {
    /// Return this body
    Body(String),
    /// Return this body after a delay
    Delayed(Duration, String),
    /// Fail with a fetch error
    Fail(String),
    /// Never complete
    Hang,
}

/// A FeedFetcher that replays scripted responses
///
/// Responses are consumed in order; the last one repeats forever.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<FetchScript>>,
    fetch_call_count: AtomicUsize,
    requested_urls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<FetchScript>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fetch_call_count: AtomicUsize::new(0),
            requested_urls: Mutex::new(Vec::new()),
        }
    }

    /// Always return the same body
    pub fn serving(body: impl Into<String>) -> Self {
        Self::new(vec![FetchScript::Body(body.into())])
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested_urls.lock().unwrap().clone()
    }

    fn next_step(&self) -> FetchScript {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or(FetchScript::Body(String::new()))
        }
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        self.requested_urls.lock().unwrap().push(url.to_string());

        match self.next_step() {
            FetchScript::Body(body) => Ok(body.into_bytes()),
            FetchScript::Delayed(delay, body) => {
                tokio::time::sleep(delay).await;
                Ok(body.into_bytes())
            }
            FetchScript::Fail(reason) => Err(Error::fetch(reason)),
            FetchScript::Hang => std::future::pending().await,
        }
    }

    fn fetcher_name(&self) -> &'static str {
        "scripted"
    }
}

/// A NotificationSink that records every notification it accepts
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
    notify_call_count: AtomicUsize,
    reject_subject: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail delivery of notifications with this subject
    pub fn rejecting(subject: impl Into<String>) -> Self {
        Self {
            reject_subject: Some(subject.into()),
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.delivered().into_iter().map(|n| n.subject).collect()
    }

    pub fn notify_call_count(&self) -> usize {
        self.notify_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.notify_call_count.fetch_add(1, Ordering::SeqCst);
        if self.reject_subject.as_deref() == Some(notification.subject.as_str()) {
            return Err(Error::sink("rejected by test sink"));
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// A WatermarkStore that counts calls and delegates to the memory store
#[derive(Default)]
pub struct CountingWatermarkStore {
    inner: MemoryWatermarkStore,
    get_call_count: AtomicUsize,
    advance_call_count: AtomicUsize,
    flush_call_count: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes always fail
    pub fn failing_writes() -> Self {
        let store = Self::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    pub fn advance_call_count(&self) -> usize {
        self.advance_call_count.load(Ordering::SeqCst)
    }

    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WatermarkStore for CountingWatermarkStore {
    async fn get_watermark(&self, source_id: &str) -> Result<i64> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.get_watermark(source_id).await
    }

    async fn get_record(&self, source_id: &str) -> Result<Option<WatermarkRecord>> {
        self.inner.get_record(source_id).await
    }

    async fn advance_watermark(&self, source_id: &str, watermark: i64) -> Result<bool> {
        self.advance_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::state_store("disk full"));
        }
        self.inner.advance_watermark(source_id, watermark).await
    }

    async fn delete_record(&self, source_id: &str) -> Result<()> {
        self.inner.delete_record(source_id).await
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        self.inner.list_sources().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// Collaborators shared between a test and the engine under test
pub struct Harness {
    pub fetcher: Arc<ScriptedFetcher>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<CountingWatermarkStore>,
}

impl Harness {
    pub fn new(fetcher: ScriptedFetcher) -> Self {
        Self::with_sink(fetcher, RecordingSink::new())
    }

    pub fn with_sink(fetcher: ScriptedFetcher, sink: RecordingSink) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sink: Arc::new(sink),
            store: Arc::new(CountingWatermarkStore::new()),
        }
    }

    pub fn engine(
        &self,
        config: FeedPollConfig,
    ) -> (
        feedpoll_core::FeedEngine,
        tokio::sync::mpsc::Receiver<feedpoll_core::EngineEvent>,
    ) {
        feedpoll_core::FeedEngine::new(
            self.fetcher.clone(),
            self.sink.clone(),
            self.store.clone(),
            config,
        )
        .expect("engine construction succeeds")
    }
}

/// Minimal config with one source
pub fn minimal_config(source_id: &str, url: &str) -> FeedPollConfig {
    FeedPollConfig::new().with_source(SourceConfig::new(source_id, url))
}

/// Build an RSS 2.0 document from (title, link, pubDate) triples
pub fn rss(channel_title: &str, items: &[(&str, &str, &str)]) -> String {
    let mut doc = format!(
        "<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel><title>{}</title>",
        channel_title
    );
    for (title, link, pub_date) in items {
        doc.push_str(&format!(
            "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate></item>",
            title, link, pub_date
        ));
    }
    doc.push_str("</channel></rss>");
    doc
}

/// Publish dates used across tests, newest first
pub const MAR_10_NOON: &str = "Sun, 10 Mar 2024 12:00:00 +0000";
pub const MAR_09_MORNING: &str = "Sat, 09 Mar 2024 08:00:00 +0000";
pub const JAN_01: &str = "Mon, 01 Jan 2024 00:00:00 GMT";

pub const MAR_10_NOON_TS: i64 = 1_710_072_000;
pub const MAR_09_MORNING_TS: i64 = 1_709_971_200;
pub const JAN_01_TS: i64 = 1_704_067_200;
