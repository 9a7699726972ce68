// # Watermark Store Trait
//
// Defines the interface for persistent watermark management.
//
// ## Purpose
//
// The watermark store suppresses re-delivery by tracking, per feed source,
// the publish time of the newest entry already delivered.
//
// ## Implementations
//
// - In-memory: `MemoryWatermarkStore`
// - File-based: `FileWatermarkStore` (JSON)
//
// ## Usage
//
// ```rust,ignore
// use feedpoll_core::WatermarkStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* WatermarkStore implementation */;
//
//     // Read the current watermark (0 when unknown)
//     let watermark = store.get_watermark("example").await?;
//
//     // Advance after delivering newer entries
//     store.advance_watermark("example", watermark + 60).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Stored watermark for one feed source
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WatermarkRecord {
    /// Publish time (seconds since epoch) of the newest delivered entry
    pub watermark: i64,
    /// When the watermark last moved
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl WatermarkRecord {
    /// Create a record stamped with the current time
    pub(crate) fn new(watermark: i64) -> Self {
        Self {
            watermark,
            updated_at: chrono::Utc::now(),
        }
    }
}

/// Trait for watermark store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Monotonicity
///
/// [`advance_watermark`](WatermarkStore::advance_watermark) must be an atomic
/// read-max-write: the stored value never decreases, even when polls of the
/// same source overlap.
///
/// ## Responsibilities
/// - ✅ Persist watermarks durably (files, databases, etc.)
/// - ✅ Serialize concurrent updates of the same source
/// - ❌ Decide which entries are new (owned by the filter)
/// - ❌ Schedule polls (owned by `FeedEngine`)
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Get the watermark for a source
    ///
    /// # Returns
    ///
    /// - `Ok(i64)`: The stored watermark, or `0` when the source is unknown
    /// - `Err(Error)`: Storage error
    async fn get_watermark(&self, source_id: &str) -> Result<i64, crate::Error>;

    /// Get the full record for a source
    async fn get_record(&self, source_id: &str) -> Result<Option<WatermarkRecord>, crate::Error>;

    /// Raise the watermark for a source to `watermark` if it is higher
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The stored watermark moved
    /// - `Ok(false)`: The stored watermark was already at or above `watermark`
    /// - `Err(Error)`: Storage error
    async fn advance_watermark(&self, source_id: &str, watermark: i64)
    -> Result<bool, crate::Error>;

    /// Forget a source
    ///
    /// Deleting an unknown source is not an error.
    async fn delete_record(&self, source_id: &str) -> Result<(), crate::Error>;

    /// List all source ids in the store
    async fn list_sources(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Some implementations may buffer writes. This ensures
    /// all changes are flushed to persistent storage.
    async fn flush(&self) -> Result<(), crate::Error>;
}
