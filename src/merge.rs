//! Source-precedence reconciliation of candle row sets.
//!
//! [`merge`] is the single place conflicting rows for the same instant are
//! resolved. It is pure and idempotent: re-merging an already merged batch is
//! a no-op, which is what makes interrupted ingestion runs safely
//! re-runnable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::candle::{Candle, Source};

/// Merges an `incoming` batch fetched with authority `incoming_source` into
/// `existing` rows, returning the combined set sorted ascending by timestamp
/// with unique timestamps.
///
/// Precedence rules per conflicting instant:
///
/// - a `historical` batch unconditionally overwrites whatever is stored;
/// - any other batch overwrites only rows that are not themselves
///   `historical`; a live update never clobbers a confirmed bar.
///
/// Comparison is by absolute instant; timestamps were normalized to UTC at
/// the fetch boundary, so string formatting never affects ordering.
pub fn merge(existing: Vec<Candle>, incoming: Vec<Candle>, incoming_source: Source) -> Vec<Candle> {
    let mut by_instant: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();

    // A stored partition never contains duplicate timestamps; if one ever
    // does, the later row wins, matching read order.
    for row in existing {
        by_instant.insert(row.timestamp, row);
    }

    for row in incoming {
        match by_instant.get(&row.timestamp) {
            None => {
                by_instant.insert(row.timestamp, row);
            }
            Some(prior) => {
                if incoming_source == Source::Historical || prior.source != Source::Historical {
                    by_instant.insert(row.timestamp, row);
                }
            }
        }
    }

    by_instant.into_values().collect()
}
