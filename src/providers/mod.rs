//! Fetcher abstraction over upstream quote providers.
//!
//! [`Fetcher`] is the unified interface the pipeline consumes, designed for
//! async usage and dynamic dispatch (`dyn Fetcher`) so the orchestration
//! layer can swap vendors or inject fakes in tests. Implementations own all
//! vendor-specific endpoint and payload logic; they hand back unvalidated
//! [`RawCandle`](crate::models::candle::RawCandle) rows and classify every
//! failure into the [`FetchError`] taxonomy the retry loop keys off.

pub mod upstox;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::candle::{RawCandle, Source};
use crate::models::timeframe::Timeframe;

/// Why a fetch failed, split by how the pipeline may recover.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider asked us to back off. Carries the provider-signaled
    /// resume delay when one was given.
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// Timeout, connection reset, server-side error. Worth retrying after a
    /// short delay.
    #[error("transient network error: {0}")]
    Transient(String),

    /// Malformed response, unknown instrument, client-side rejection.
    /// Retrying will not help.
    #[error("permanent fetch error: {0}")]
    Permanent(String),
}

/// Parameters for one fetch: which interval, which window, which authority.
///
/// `source` selects the endpoint family: `Historical` hits the date-ranged
/// archive, the intraday variants hit the live feed (which ignores the date
/// window; the pipeline trims rows before `from` after normalization).
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub timeframe: Timeframe,
    /// Start of the requested window (inclusive).
    pub from: NaiveDate,
    /// End of the requested window (inclusive).
    pub to: NaiveDate,
    /// Authority the fetched rows will carry into the merge.
    pub source: Source,
}

/// Trait for fetching candle rows from a quote provider.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the raw candle rows for one instrument.
    ///
    /// An instrument with no data in the window yields `Ok(vec![])`, not an
    /// error.
    async fn fetch(
        &self,
        instrument_key: &str,
        request: &FetchRequest,
    ) -> Result<Vec<RawCandle>, FetchError>;
}
