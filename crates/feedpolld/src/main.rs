// # feedpolld - Feed Polling Daemon
//
// A thin integration layer: all polling logic lives in feedpoll-core.
//
// The feedpolld daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the HTTP fetcher, watermark store and log sink into the engine
// 4. Running until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Feeds
// - `FEEDPOLL_FEEDS`: Comma-separated feeds, each `id=url` or a bare url
//
// ### State Store
// - `FEEDPOLL_STATE_STORE_TYPE`: Type of state store (file, memory)
// - `FEEDPOLL_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Engine
// - `FEEDPOLL_POLL_INTERVAL_SECS`: Seconds between polls of one feed (default 60)
// - `FEEDPOLL_FETCH_TIMEOUT_SECS`: Upper bound on one fetch (default 30)
// - `FEEDPOLL_MAX_FEED_BYTES`: Largest accepted feed body (default 10 MiB)
// - `FEEDPOLL_DELIVERY_ORDER`: newest or oldest (default newest)
// - `FEEDPOLL_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export FEEDPOLL_FEEDS=rust=https://blog.rust-lang.org/feed.xml
// export FEEDPOLL_STATE_STORE_TYPE=file
// export FEEDPOLL_STATE_STORE_PATH=/var/lib/feedpoll/state.json
//
// feedpolld
// ```

use anyhow::Result;
use feedpoll_core::config::{
    DeliveryOrder, EngineConfig, FeedPollConfig, SourceConfig, StateStoreConfig,
};
use feedpoll_core::traits::WatermarkStore;
use feedpoll_core::{EngineEvent, FeedEngine, FileWatermarkStore, MemoryWatermarkStore, TracingSink};
use feedpoll_fetch_http::{DEFAULT_MAX_BYTES, HttpFeedFetcher};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound on stopping all sources after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedpollExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<FeedpollExitCode> for ExitCode {
    fn from(code: FeedpollExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    feeds: Vec<SourceConfig>,
    state_store_type: String,
    state_store_path: Option<String>,
    poll_interval_secs: u64,
    fetch_timeout_secs: u64,
    max_feed_bytes: usize,
    delivery_order: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            feeds: parse_feeds(&lookup("FEEDPOLL_FEEDS").unwrap_or_default())?,
            state_store_type: lookup("FEEDPOLL_STATE_STORE_TYPE")
                .unwrap_or_else(|| "file".to_string()),
            state_store_path: lookup("FEEDPOLL_STATE_STORE_PATH"),
            poll_interval_secs: parse_number(&lookup, "FEEDPOLL_POLL_INTERVAL_SECS", 60)?,
            fetch_timeout_secs: parse_number(&lookup, "FEEDPOLL_FETCH_TIMEOUT_SECS", 30)?,
            max_feed_bytes: parse_number(&lookup, "FEEDPOLL_MAX_FEED_BYTES", DEFAULT_MAX_BYTES)?,
            delivery_order: lookup("FEEDPOLL_DELIVERY_ORDER")
                .unwrap_or_else(|| "newest".to_string()),
            log_level: lookup("FEEDPOLL_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            anyhow::bail!(
                "FEEDPOLL_FEEDS must contain at least one feed. \
                Set it via: export FEEDPOLL_FEEDS=news=https://example.com/rss"
            );
        }

        for feed in &self.feeds {
            if !feed.url.is_empty()
                && !feed.url.starts_with("https://")
                && !feed.url.starts_with("http://")
            {
                anyhow::bail!(
                    "Feed '{}' must use an HTTP or HTTPS URL. Got: {}",
                    feed.id,
                    feed.url
                );
            }
        }

        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "FEEDPOLL_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file"
            && self.state_store_path.as_ref().is_none_or(|p| p.is_empty())
        {
            anyhow::bail!(
                "FEEDPOLL_STATE_STORE_PATH is required when FEEDPOLL_STATE_STORE_TYPE=file. \
                Set it via: export FEEDPOLL_STATE_STORE_PATH=/var/lib/feedpoll/state.json"
            );
        }

        if !(1..=86_400).contains(&self.poll_interval_secs) {
            anyhow::bail!(
                "FEEDPOLL_POLL_INTERVAL_SECS must be between 1 and 86400 seconds. Got: {}",
                self.poll_interval_secs
            );
        }

        if !(1..=300).contains(&self.fetch_timeout_secs) {
            anyhow::bail!(
                "FEEDPOLL_FETCH_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.fetch_timeout_secs
            );
        }

        if self.max_feed_bytes == 0 {
            anyhow::bail!("FEEDPOLL_MAX_FEED_BYTES must be greater than 0");
        }

        self.delivery_order()?;
        self.log_level()?;

        Ok(())
    }

    fn delivery_order(&self) -> Result<DeliveryOrder> {
        match self.delivery_order.to_lowercase().as_str() {
            "newest" => Ok(DeliveryOrder::NewestFirst),
            "oldest" => Ok(DeliveryOrder::OldestFirst),
            _ => anyhow::bail!(
                "FEEDPOLL_DELIVERY_ORDER '{}' is not valid. Valid orders: newest, oldest",
                self.delivery_order
            ),
        }
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "FEEDPOLL_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    /// Build the core configuration
    fn to_feedpoll_config(&self) -> Result<FeedPollConfig> {
        let state_store = match self.state_store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            _ => StateStoreConfig::File {
                path: self.state_store_path.clone().unwrap_or_default(),
            },
        };

        let config = FeedPollConfig {
            sources: self.feeds.clone(),
            state_store,
            engine: EngineConfig {
                poll_interval_secs: self.poll_interval_secs,
                fetch_timeout_secs: self.fetch_timeout_secs,
                delivery_order: self.delivery_order()?,
                ..EngineConfig::default()
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parse `FEEDPOLL_FEEDS`
///
/// Entries are comma-separated. `id=url` names the feed explicitly; a bare
/// url is its own id. `id=` configures a feed that is never fetched.
fn parse_feeds(raw: &str) -> Result<Vec<SourceConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let source = match entry.split_once('=') {
                // A '=' inside the query string of a bare url is not a separator
                Some((id, url)) if !id.contains(':') && !id.contains('/') => {
                    SourceConfig::new(id.trim(), url.trim())
                }
                _ => SourceConfig::new(entry, entry),
            };
            if source.id.is_empty() {
                anyhow::bail!("Feed entry '{}' has an empty id", entry);
            }
            Ok(source)
        })
        .collect()
}

fn parse_number<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a number. Got '{}': {}", key, value, e)),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FeedpollExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return FeedpollExitCode::ConfigError.into();
    }

    let log_level = config.log_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FeedpollExitCode::ConfigError.into();
    }

    info!("Starting feedpolld daemon");
    info!("Configuration loaded: {} feed(s)", config.feeds.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FeedpollExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            FeedpollExitCode::RuntimeError
        } else {
            FeedpollExitCode::CleanShutdown
        }
    })
    .into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let feedpoll_config = config.to_feedpoll_config()?;

    let store: Arc<dyn WatermarkStore> = match &feedpoll_config.state_store {
        StateStoreConfig::File { path } => {
            info!("Using file state store at {}", path);
            Arc::new(FileWatermarkStore::new(path).await?)
        }
        StateStoreConfig::Memory => {
            info!("Using in-memory state store; watermarks are lost on restart");
            Arc::new(MemoryWatermarkStore::new())
        }
    };

    let fetcher = HttpFeedFetcher::with_limits(
        feedpoll_config.engine.fetch_timeout(),
        config.max_feed_bytes,
    );

    for feed in &feedpoll_config.sources {
        info!("Watching feed {}: {}", feed.id, feed.url);
    }

    let (engine, mut events) = FeedEngine::new(
        Arc::new(fetcher),
        Arc::new(TracingSink::new()),
        store,
        feedpoll_config,
    )?;

    // Drain engine events so the channel never fills
    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::PollFailed { source_id, error } => {
                    debug!("Poll of {} failed: {}", source_id, error)
                }
                other => debug!("Engine event: {:?}", other),
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_task = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, engine_task).await {
        Ok(joined) => joined??,
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
    }

    // The engine and its sender are gone, so the logger ends on its own
    let _ = event_logger.await;
    info!("Shutting down daemon");

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
