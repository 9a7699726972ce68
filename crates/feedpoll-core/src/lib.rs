// # feedpoll-core
//
// Core library for polling syndication feeds and delivering each new entry
// exactly once.
//
// ## Architecture Overview
//
// - **timestamp**: Parses RFC-822 style publish dates into epoch seconds
// - **decoder**: Turns a fetched body into a channel title and dated entries
// - **filter**: Selects entries newer than the per-source watermark
// - **FeedEngine**: Schedules polls and drives fetch, decode, filter, notify
// - **FeedFetcher / NotificationSink / WatermarkStore**: Collaborator traits
//
// ## Design Principles
//
// 1. Feed and network errors never escape a tick
// 2. The watermark only moves forward
// 3. All core functionality can be used as a library

pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod filter;
pub mod sink;
pub mod state;
pub mod timestamp;
pub mod traits;

// Re-export core types for convenience
pub use config::{DeliveryOrder, EngineConfig, FeedPollConfig, SourceConfig, StateStoreConfig};
pub use decoder::{DecodedFeed, FeedEntry};
pub use engine::{
    EngineEvent, FeedEngine, FeedSource, PollOutcome, PollStatus, SourceHandle, SourceState,
};
pub use error::{DecodeError, Error, Result};
pub use filter::{FilterOutcome, filter_new_entries};
pub use sink::{ChannelSink, TracingSink};
pub use state::{FileWatermarkStore, MemoryWatermarkStore};
pub use timestamp::parse_pub_date;
pub use traits::{FeedFetcher, Notification, NotificationSink, WatermarkRecord, WatermarkStore};
