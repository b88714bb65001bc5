//! Merge-write storage engine for OHLCV candle partitions.
//!
//! The crate ingests time-series price bars for many symbols and timeframes
//! from an upstream quote provider and persists them as per-symbol,
//! per-timeframe parquet partitions, merging newly fetched rows into whatever
//! is already stored.
//!
//! The moving parts, leaf-first:
//!
//! - [`models`]: the validated [`Candle`](models::candle::Candle) row type and
//!   the [`Timeframe`](models::timeframe::Timeframe) tags.
//! - [`merge`]: pure source-precedence reconciliation of an existing row set
//!   with an incoming batch.
//! - [`gaps`]: diagnostic scan for missing bars in fixed-interval series.
//! - [`io`]: durable, atomic read/replace of one partition on disk.
//! - [`pipeline`]: orchestration: bounded fetch/write parallelism, one
//!   writer per partition, bounded retries, and a per-unit run summary.
//! - [`providers`]: the async [`Fetcher`](providers::Fetcher) trait plus the
//!   Upstox REST implementation.
//! - [`catalog`]: CSV symbol → instrument-key catalog.
//! - [`session`]: IST trading-session cutoff helpers.

pub mod catalog;
pub mod config;
pub mod errors;
pub mod gaps;
pub mod io;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod session;
