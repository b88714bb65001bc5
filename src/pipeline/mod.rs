//! Orchestrates fetch → merge → atomic replace per (symbol, timeframe).
//!
//! Each [`IngestionUnit`] runs as its own task over a bounded pool. A unit
//! holds its partition's exclusive section only for the span of its own
//! read-merge-replace cycle, never across fetch waits or backoff sleeps.
//! Per-unit failures are recorded in the [`RunSummary`] and never abort
//! sibling units; because the merge is idempotent and every replace is
//! atomic, an interrupted run is safely re-runnable.

pub mod limits;
mod retry;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{PipelineConfig, RetryPolicy};
use crate::gaps::detect_gaps;
use crate::io::StoreError;
use crate::io::partition::PartitionStore;
use crate::merge::merge;
use crate::models::candle::{Candle, CandleError, RawCandle, Source};
use crate::models::timeframe::Timeframe;
use crate::providers::{FetchError, FetchRequest, Fetcher};
use limits::ConcurrencyController;

/// One unit of ingestion work: one symbol at one timeframe with one source
/// authority.
#[derive(Debug, Clone)]
pub struct IngestionUnit {
    pub symbol: String,
    pub instrument_key: String,
    pub timeframe: Timeframe,
    /// Start of the requested window (inclusive). Rows before this date are
    /// dropped even when the endpoint returns them.
    pub from: NaiveDate,
    /// End of the requested window (inclusive).
    pub to: NaiveDate,
    /// Authority the fetched rows carry into the merge.
    pub source: Source,
}

/// Why a unit ended up in the failed column.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The fetch failed permanently or exhausted its retry budget.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A fetched row was rejected during normalization.
    #[error("row rejected during normalization: {0}")]
    Normalize(#[from] CandleError),

    /// The partition read or replace failed; the previously committed
    /// snapshot is intact.
    #[error("storage failed: {0}")]
    Store(#[from] StoreError),
}

/// Terminal state of one unit.
#[derive(Debug)]
pub enum UnitOutcome {
    /// The merge-write cycle committed. `rows_written` is the size of the
    /// merged partition after the replace; zero means the provider returned
    /// nothing and the partition was left untouched.
    Done { rows_written: usize, gaps: usize },
    /// The unit failed; sibling units were unaffected.
    Failed { error: UnitError },
}

/// Per-unit report in the final tally.
#[derive(Debug)]
pub struct UnitReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub source: Source,
    pub outcome: UnitOutcome,
}

impl UnitReport {
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Done { .. })
    }
}

/// Final tally for one ingestion run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<UnitReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }

    /// Reports for units that did not commit.
    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.reports.iter().filter(|r| !r.is_done())
    }
}

/// Drives a set of ingestion units to completion.
pub struct IngestionPipeline {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<PartitionStore>,
    controller: Arc<ConcurrencyController>,
    retry_policy: RetryPolicy,
}

impl IngestionPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<PartitionStore>,
        config: PipelineConfig,
    ) -> Self {
        let controller = Arc::new(ConcurrencyController::new(
            config.fetch_concurrency,
            config.write_concurrency,
        ));
        Self {
            fetcher,
            store,
            controller,
            retry_policy: config.retry,
        }
    }

    /// Runs all units to completion and returns the tally.
    ///
    /// Relative completion order across units is unspecified and does not
    /// matter: the merge is commutative under source precedence, so the
    /// final partition content is the same for any serialization.
    pub async fn run(&self, units: Vec<IngestionUnit>) -> RunSummary {
        info!(units = units.len(), "ingestion run started");

        let mut tasks = JoinSet::new();
        for unit in units {
            let fetcher = Arc::clone(&self.fetcher);
            let store = Arc::clone(&self.store);
            let controller = Arc::clone(&self.controller);
            let retry_policy = self.retry_policy.clone();

            tasks.spawn(async move {
                let outcome =
                    match process_unit(&*fetcher, &store, &controller, &retry_policy, &unit).await
                    {
                        Ok((rows_written, gaps)) => UnitOutcome::Done { rows_written, gaps },
                        Err(error) => {
                            error!(
                                symbol = %unit.symbol,
                                timeframe = %unit.timeframe,
                                %error,
                                "unit failed"
                            );
                            UnitOutcome::Failed { error }
                        }
                    };
                UnitReport {
                    symbol: unit.symbol,
                    timeframe: unit.timeframe,
                    source: unit.source,
                    outcome,
                }
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(join_error) => error!(%join_error, "ingestion task panicked"),
            }
        }

        let summary = RunSummary { reports };
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "ingestion run finished"
        );
        summary
    }
}

async fn process_unit(
    fetcher: &dyn Fetcher,
    store: &PartitionStore,
    controller: &ConcurrencyController,
    retry_policy: &RetryPolicy,
    unit: &IngestionUnit,
) -> Result<(usize, usize), UnitError> {
    let request = FetchRequest {
        timeframe: unit.timeframe,
        from: unit.from,
        to: unit.to,
        source: unit.source,
    };

    let raw = {
        let _permit = controller.acquire_fetch().await;
        retry::fetch_with_retry(fetcher, &unit.instrument_key, &request, retry_policy).await?
    };
    if raw.is_empty() {
        return Ok((0, 0));
    }

    let incoming = normalize(unit, &raw)?;
    if incoming.is_empty() {
        return Ok((0, 0));
    }

    // Exclusive section: from here to the end of atomic_replace, no other
    // task may touch this partition.
    let key = (unit.timeframe, unit.symbol.clone());
    let lock = controller.partition_lock(&key);
    let _guard = lock.lock().await;
    let _write_permit = controller.acquire_write().await;

    let existing = store.read(unit.timeframe, &unit.symbol)?;
    let merged = merge(existing, incoming, unit.source);

    let gaps = detect_gaps(&merged, unit.timeframe);
    for gap in &gaps {
        warn!(
            symbol = %unit.symbol,
            timeframe = %unit.timeframe,
            from = %gap.from,
            to = %gap.to,
            missing_minutes = gap.missing_minutes,
            "gap in merged series"
        );
    }

    let rows_written = merged.len();
    store.atomic_replace(unit.timeframe, &unit.symbol, &merged)?;
    Ok((rows_written, gaps.len()))
}

/// Validates raw provider rows into candles.
///
/// Duplicate timestamps within the batch are dropped (first occurrence wins,
/// matching provider order), rows before the unit's window are trimmed (the
/// intraday endpoint ignores date bounds), and the result is sorted
/// ascending.
fn normalize(unit: &IngestionUnit, raw: &[RawCandle]) -> Result<Vec<Candle>, UnitError> {
    let mut seen: HashSet<DateTime<Utc>> = HashSet::with_capacity(raw.len());
    let mut rows = Vec::with_capacity(raw.len());

    for row in raw {
        let candle = Candle::from_raw(
            &unit.symbol,
            &unit.instrument_key,
            unit.timeframe,
            unit.source,
            row,
        )?;
        if candle.timestamp.date_naive() < unit.from {
            continue;
        }
        if seen.insert(candle.timestamp) {
            rows.push(candle);
        }
    }

    rows.sort_by_key(|c| c.timestamp);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(from: &str) -> IngestionUnit {
        IngestionUnit {
            symbol: "sbin".to_string(),
            instrument_key: "NSE_EQ|INE062A01020".to_string(),
            timeframe: Timeframe::Min15,
            from: from.parse().unwrap(),
            to: "2024-12-31".parse().unwrap(),
            source: Source::Intraday,
        }
    }

    fn raw(timestamp: &str, close: f64) -> RawCandle {
        RawCandle {
            timestamp: timestamp.to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
        }
    }

    #[test]
    fn normalize_dedupes_sorts_and_uppercases() {
        let rows = normalize(
            &unit("2024-01-01"),
            &[
                raw("2024-01-02T09:30:00Z", 2.0),
                raw("2024-01-02T09:15:00Z", 1.0),
                raw("2024-01-02T09:30:00Z", 99.0),
            ],
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].close, 1.0);
        assert_eq!(rows[1].close, 2.0); // first occurrence won the duplicate
        assert!(rows.iter().all(|c| c.symbol == "SBIN"));
    }

    #[test]
    fn normalize_trims_rows_before_the_window() {
        let rows = normalize(
            &unit("2024-06-01"),
            &[
                raw("2024-05-31T09:15:00Z", 1.0),
                raw("2024-06-01T09:15:00Z", 2.0),
            ],
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 2.0);
    }

    #[test]
    fn normalize_surfaces_bad_rows() {
        let mut bad = raw("2024-06-01T09:15:00Z", 1.0);
        bad.volume = -1;
        assert!(matches!(
            normalize(&unit("2024-01-01"), &[bad]),
            Err(UnitError::Normalize(_))
        ));
    }
}
