//! Bar-interval tags supported by the ingestion pipeline.
//!
//! Month, week, and day are "higher timeframe": their calendar spacing is
//! irregular, so they carry no expected inter-candle spacing. Hour and
//! 15-minute are intraday with a fixed spacing used by the gap scan.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The timeframe string could not be recognized.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown timeframe: {0}")]
pub struct ParseTimeframeError(pub String);

/// The time interval of one candle.
///
/// The serialized tags match the on-disk partition names: `1m` (month!),
/// `1w`, `1d`, `1h`, `15m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// Calendar month bars, tag `1m`.
    #[serde(rename = "1m")]
    Monthly,
    /// Calendar week bars, tag `1w`.
    #[serde(rename = "1w")]
    Weekly,
    /// Daily bars, tag `1d`.
    #[serde(rename = "1d")]
    Daily,
    /// Hourly bars, tag `1h`.
    #[serde(rename = "1h")]
    Hourly,
    /// 15-minute bars, tag `15m`.
    #[serde(rename = "15m")]
    Min15,
}

impl Timeframe {
    /// Every supported timeframe, higher timeframes first.
    pub const ALL: [Timeframe; 5] = [
        Timeframe::Monthly,
        Timeframe::Weekly,
        Timeframe::Daily,
        Timeframe::Hourly,
        Timeframe::Min15,
    ];

    /// The partition/tag string for this timeframe.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Monthly => "1m",
            Timeframe::Weekly => "1w",
            Timeframe::Daily => "1d",
            Timeframe::Hourly => "1h",
            Timeframe::Min15 => "15m",
        }
    }

    /// Expected minutes between adjacent candles, for timeframes where that
    /// spacing is fixed. `None` for calendar-spaced timeframes.
    pub fn expected_spacing_minutes(&self) -> Option<i64> {
        match self {
            Timeframe::Min15 => Some(15),
            Timeframe::Hourly => Some(60),
            _ => None,
        }
    }

    /// Whether this timeframe is served by the intraday endpoint family.
    pub fn is_intraday(&self) -> bool {
        matches!(self, Timeframe::Hourly | Timeframe::Min15)
    }

    /// The `(unit, interval)` path segments the quote API expects.
    pub fn api_unit(&self) -> (&'static str, u32) {
        match self {
            Timeframe::Monthly => ("months", 1),
            Timeframe::Weekly => ("weeks", 1),
            Timeframe::Daily => ("days", 1),
            Timeframe::Hourly => ("hours", 1),
            Timeframe::Min15 => ("minutes", 15),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::Monthly),
            "1w" => Ok(Timeframe::Weekly),
            "1d" => Ok(Timeframe::Daily),
            "1h" => Ok(Timeframe::Hourly),
            "15m" => Ok(Timeframe::Min15),
            other => Err(ParseTimeframeError(other.to_string())),
        }
    }
}
