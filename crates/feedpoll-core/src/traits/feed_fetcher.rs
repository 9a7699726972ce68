// # Feed Fetcher Trait
//
// Defines the interface to the network collaborator.
//
// ## Implementations
//
// - HTTP: `feedpoll-fetch-http` crate
// - Tests: scripted in-memory fetchers
//
// ## Usage
//
// ```rust,ignore
// use feedpoll_core::FeedFetcher;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let fetcher = /* FeedFetcher implementation */;
//     let body = fetcher.fetch("https://example.com/feed.xml").await?;
//     println!("{} bytes", body.len());
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for network fetcher implementations
///
/// A fetcher performs exactly one retrieval per call and reports failure
/// as an error. It does not retry, cache, or decode; the engine owns those
/// decisions.
///
/// # Thread Safety
///
/// Implementations must be usable concurrently from several source tasks.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the raw body at `url`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<u8>)`: The response body, possibly empty
    /// - `Err(Error)`: Transport or protocol failure
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, crate::Error>;

    /// Name used in logs
    fn fetcher_name(&self) -> &'static str {
        "fetcher"
    }
}
