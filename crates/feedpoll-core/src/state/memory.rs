// # Memory Watermark Store
//
// In-memory implementation of WatermarkStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and embedding.
//
// ## Crash Behavior
//
// - All watermarks are lost on restart
// - The first poll after a restart delivers every dated entry in the feed

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::watermark_store::{WatermarkRecord, WatermarkStore};

/// In-memory watermark store
///
/// # Example
///
/// ```rust,no_run
/// use feedpoll_core::state::MemoryWatermarkStore;
/// use feedpoll_core::traits::WatermarkStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryWatermarkStore::new();
///
///     store.advance_watermark("example", 1_700_000_000).await?;
///     assert_eq!(store.get_watermark("example").await?, 1_700_000_000);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryWatermarkStore {
    inner: Arc<RwLock<HashMap<String, WatermarkRecord>>>,
}

impl MemoryWatermarkStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of sources in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Clear all records from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn get_watermark(&self, source_id: &str) -> Result<i64, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(source_id).map_or(0, |record| record.watermark))
    }

    async fn get_record(&self, source_id: &str) -> Result<Option<WatermarkRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(source_id).cloned())
    }

    async fn advance_watermark(&self, source_id: &str, watermark: i64) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        let current = guard.get(source_id).map_or(0, |record| record.watermark);
        if watermark <= current {
            return Ok(false);
        }
        guard.insert(source_id.to_string(), WatermarkRecord::new(watermark));
        Ok(true)
    }

    async fn delete_record(&self, source_id: &str) -> Result<(), Error> {
        self.inner.write().await.remove(source_id);
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}
