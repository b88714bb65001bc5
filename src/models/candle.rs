//! Canonical in-memory representation of one OHLCV candle row.
//!
//! A [`Candle`] is the validated unit the merge and storage layers operate
//! on. Provider rows arrive as [`RawCandle`] values and are promoted through
//! [`Candle::from_raw`] at the fetch-normalization boundary; nothing past
//! that boundary re-validates fields.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::timeframe::Timeframe;

/// Provenance and authority of a candle row.
///
/// This is not just the origin endpoint: `Historical` marks confirmed
/// settlement data that wins every merge conflict, while the intraday
/// variants are live values that may be superseded later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Confirmed bars from the historical range endpoint.
    Historical,
    /// Live bars from the intraday endpoint; provisional.
    Intraday,
    /// The post-close daily bar taken from the intraday feed.
    IntradayFinal,
}

impl Source {
    /// The on-disk tag for this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Historical => "historical",
            Source::Intraday => "intraday",
            Source::IntradayFinal => "intraday_final",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The source string could not be recognized.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown candle source: {0}")]
pub struct ParseSourceError(pub String);

impl FromStr for Source {
    type Err = ParseSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "historical" => Ok(Source::Historical),
            "intraday" => Ok(Source::Intraday),
            "intraday_final" => Ok(Source::IntradayFinal),
            other => Err(ParseSourceError(other.to_string())),
        }
    }
}

/// One unvalidated row as returned by a quote provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandle {
    /// ISO-8601 timestamp string, any offset.
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// A provider row failed validation.
#[derive(Debug, Error)]
pub enum CandleError {
    /// The timestamp string is not valid RFC 3339.
    #[error("invalid timestamp {raw:?}: {message}")]
    Timestamp { raw: String, message: String },

    /// A price field is NaN or infinite.
    #[error("non-finite {field} for {symbol} at {timestamp}")]
    NonFinitePrice {
        field: &'static str,
        symbol: String,
        timestamp: String,
    },

    /// The high is below the low.
    #[error("high {high} below low {low} for {symbol} at {timestamp}")]
    HighBelowLow {
        high: f64,
        low: f64,
        symbol: String,
        timestamp: String,
    },

    /// Volume is negative.
    #[error("negative volume {volume} for {symbol} at {timestamp}")]
    NegativeVolume {
        volume: i64,
        symbol: String,
        timestamp: String,
    },
}

/// One OHLCV bar for a symbol at a timeframe and instant.
///
/// `timestamp` is the unique key within a partition. It is held as a UTC
/// instant: comparisons everywhere are by absolute time, never by the raw
/// string the provider sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    /// Exchange ticker, uppercase-normalized.
    pub symbol: String,
    /// Provider-specific identifier (exchange segment + ISIN).
    pub instrument_key: String,
    /// The interval this bar covers.
    pub timeframe: Timeframe,
    /// Bar timestamp, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Provenance/authority of this row.
    pub source: Source,
}

impl Candle {
    /// Validates and normalizes one provider row.
    ///
    /// The timestamp is parsed as RFC 3339 and converted to UTC, the symbol
    /// is uppercased, and price/volume fields are range-checked.
    pub fn from_raw(
        symbol: &str,
        instrument_key: &str,
        timeframe: Timeframe,
        source: Source,
        raw: &RawCandle,
    ) -> Result<Self, CandleError> {
        let timestamp = DateTime::parse_from_rfc3339(&raw.timestamp)
            .map_err(|e| CandleError::Timestamp {
                raw: raw.timestamp.clone(),
                message: e.to_string(),
            })?
            .with_timezone(&Utc);

        for (field, value) in [
            ("open", raw.open),
            ("high", raw.high),
            ("low", raw.low),
            ("close", raw.close),
        ] {
            if !value.is_finite() {
                return Err(CandleError::NonFinitePrice {
                    field,
                    symbol: symbol.to_string(),
                    timestamp: raw.timestamp.clone(),
                });
            }
        }
        if raw.high < raw.low {
            return Err(CandleError::HighBelowLow {
                high: raw.high,
                low: raw.low,
                symbol: symbol.to_string(),
                timestamp: raw.timestamp.clone(),
            });
        }
        if raw.volume < 0 {
            return Err(CandleError::NegativeVolume {
                volume: raw.volume,
                symbol: symbol.to_string(),
                timestamp: raw.timestamp.clone(),
            });
        }

        Ok(Candle {
            symbol: symbol.to_uppercase(),
            instrument_key: instrument_key.to_string(),
            timeframe,
            timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
            source,
        })
    }
}
