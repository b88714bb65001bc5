//! Data-quality scan for missing bars in fixed-interval series.
//!
//! A gap is inferred whenever the elapsed time between adjacent candles
//! exceeds 1.5x the timeframe's expected spacing. The scan is a diagnostic
//! signal only; it never blocks or alters storage.

use chrono::{DateTime, Utc};

use crate::models::{candle::Candle, timeframe::Timeframe};

/// A run of missing candles between two stored rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Gap {
    /// Last candle before the gap.
    pub from: DateTime<Utc>,
    /// First candle after the gap.
    pub to: DateTime<Utc>,
    /// Elapsed minutes minus the expected spacing.
    pub missing_minutes: f64,
}

/// Scans a sorted row set for gaps.
///
/// Returns an empty vec for timeframes without a fixed expected spacing
/// (daily and higher, whose calendar spacing is irregular) and for inputs
/// with fewer than two rows.
pub fn detect_gaps(rows: &[Candle], timeframe: Timeframe) -> Vec<Gap> {
    let Some(expected) = timeframe.expected_spacing_minutes() else {
        return Vec::new();
    };
    let expected = expected as f64;

    let mut gaps = Vec::new();
    for pair in rows.windows(2) {
        let elapsed = (pair[1].timestamp - pair[0].timestamp).num_seconds() as f64 / 60.0;
        if elapsed > expected * 1.5 {
            gaps.push(Gap {
                from: pair[0].timestamp,
                to: pair[1].timestamp,
                missing_minutes: elapsed - expected,
            });
        }
    }
    gaps
}
