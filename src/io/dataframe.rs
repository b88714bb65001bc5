//! Conversions between candle rows and the on-disk columnar schema.
//!
//! Schema per row: `symbol`, `instrument_key`, `timeframe`, `timestamp`
//! (RFC 3339 string, UTC), `open`/`high`/`low`/`close` (f64), `volume`
//! (i64), `source`. Timestamps are written in a single canonical offset so
//! their lexical order coincides with chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use polars::prelude::*;

use crate::io::StoreError;
use crate::models::candle::{Candle, Source};
use crate::models::timeframe::Timeframe;

/// Column names of the partition schema, in stored order.
pub const COLUMNS: [&str; 10] = [
    "symbol",
    "instrument_key",
    "timeframe",
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "source",
];

/// Builds the columnar frame for a partition snapshot.
pub fn candles_to_dataframe(rows: &[Candle]) -> Result<DataFrame, StoreError> {
    let symbols: Vec<&str> = rows.iter().map(|c| c.symbol.as_str()).collect();
    let keys: Vec<&str> = rows.iter().map(|c| c.instrument_key.as_str()).collect();
    let timeframes: Vec<&str> = rows.iter().map(|c| c.timeframe.as_str()).collect();
    let timestamps: Vec<String> = rows
        .iter()
        .map(|c| c.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
        .collect();
    let opens: Vec<f64> = rows.iter().map(|c| c.open).collect();
    let highs: Vec<f64> = rows.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = rows.iter().map(|c| c.low).collect();
    let closes: Vec<f64> = rows.iter().map(|c| c.close).collect();
    let volumes: Vec<i64> = rows.iter().map(|c| c.volume).collect();
    let sources: Vec<&str> = rows.iter().map(|c| c.source.as_str()).collect();

    let df = DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("instrument_key".into(), keys),
        Column::new("timeframe".into(), timeframes),
        Column::new("timestamp".into(), timestamps),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("source".into(), sources),
    ])?;
    Ok(df)
}

/// Reads candle rows back out of a stored frame.
pub fn dataframe_to_candles(df: &DataFrame) -> Result<Vec<Candle>, StoreError> {
    for name in COLUMNS {
        if df.column(name).is_err() {
            return Err(StoreError::corrupt(format!("missing column '{name}'")));
        }
    }

    let symbols = df.column("symbol")?.str()?;
    let keys = df.column("instrument_key")?.str()?;
    let timeframes = df.column("timeframe")?.str()?;
    let timestamps = df.column("timestamp")?.str()?;
    let opens = df.column("open")?.f64()?;
    let highs = df.column("high")?.f64()?;
    let lows = df.column("low")?.f64()?;
    let closes = df.column("close")?.f64()?;
    let volumes = df.column("volume")?.i64()?;
    let sources = df.column("source")?.str()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let get_str = |col: &StringChunked, name: &str| {
            col.get(i)
                .ok_or_else(|| StoreError::corrupt(format!("null {name} at row {i}")))
                .map(str::to_string)
        };

        let timestamp_raw = get_str(timestamps, "timestamp")?;
        let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp_raw)
            .map_err(|e| StoreError::corrupt(format!("bad timestamp {timestamp_raw:?}: {e}")))?
            .with_timezone(&Utc);
        let timeframe_raw = get_str(timeframes, "timeframe")?;
        let timeframe: Timeframe = timeframe_raw
            .parse()
            .map_err(|e| StoreError::corrupt(format!("{e}")))?;
        let source_raw = get_str(sources, "source")?;
        let source: Source = source_raw
            .parse()
            .map_err(|e| StoreError::corrupt(format!("{e}")))?;

        rows.push(Candle {
            symbol: get_str(symbols, "symbol")?,
            instrument_key: get_str(keys, "instrument_key")?,
            timeframe,
            timestamp,
            open: opens
                .get(i)
                .ok_or_else(|| StoreError::corrupt(format!("null open at row {i}")))?,
            high: highs
                .get(i)
                .ok_or_else(|| StoreError::corrupt(format!("null high at row {i}")))?,
            low: lows
                .get(i)
                .ok_or_else(|| StoreError::corrupt(format!("null low at row {i}")))?,
            close: closes
                .get(i)
                .ok_or_else(|| StoreError::corrupt(format!("null close at row {i}")))?,
            volume: volumes
                .get(i)
                .ok_or_else(|| StoreError::corrupt(format!("null volume at row {i}")))?,
            source,
        });
    }
    Ok(rows)
}
