//! Incremental filtering against a watermark
//!
//! Entries arrive newest-first. Walking them in order, every entry newer
//! than the watermark is new; the walk stops at the first entry that is not.
//! Entries after the stop point are never inspected, so a misordered feed
//! can hide new entries behind an old one. `old_entry_tolerance` relaxes
//! this by allowing a number of consecutive old entries before stopping.

use crate::decoder::FeedEntry;

/// Result of filtering one poll's entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// New entries in document order (newest first)
    pub new_entries: Vec<FeedEntry>,
    /// `max(watermark, published_at of every inspected entry)`
    pub watermark: i64,
    /// How many entries were looked at before stopping
    pub inspected: usize,
}

/// Select entries newer than `watermark`, stopping at the first old one
pub fn filter_new_entries(entries: Vec<FeedEntry>, watermark: i64) -> FilterOutcome {
    filter_with_tolerance(entries, watermark, 0)
}

/// Select entries newer than `watermark`
///
/// Iteration stops once more than `tolerance` consecutive entries are at or
/// below the watermark. A tolerance of 0 stops at the first old entry.
pub fn filter_with_tolerance(
    entries: Vec<FeedEntry>,
    watermark: i64,
    tolerance: usize,
) -> FilterOutcome {
    let mut new_entries = Vec::new();
    let mut newest = watermark;
    let mut inspected = 0;
    let mut consecutive_old = 0;

    for entry in entries {
        inspected += 1;
        newest = newest.max(entry.published_at);

        if entry.published_at <= watermark {
            tracing::debug!(
                "Entry '{}' ({}) is not newer than watermark {}",
                entry.title,
                entry.published_at,
                watermark
            );
            consecutive_old += 1;
            if consecutive_old > tolerance {
                break;
            }
            continue;
        }

        consecutive_old = 0;
        new_entries.push(entry);
    }

    FilterOutcome {
        new_entries,
        watermark: newest,
        inspected,
    }
}
