//! End-to-end pipeline behavior against a scripted fetcher and a real
//! on-disk store: retries, partial-failure isolation, source precedence,
//! and per-partition serialization.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use candle_ingestor::config::{PipelineConfig, RetryPolicy};
use candle_ingestor::io::partition::PartitionStore;
use candle_ingestor::models::candle::{RawCandle, Source};
use candle_ingestor::models::timeframe::Timeframe;
use candle_ingestor::pipeline::{IngestionPipeline, IngestionUnit, UnitError, UnitOutcome};
use candle_ingestor::providers::{FetchError, FetchRequest, Fetcher};

type Script = VecDeque<Result<Vec<RawCandle>, FetchError>>;

/// Fetcher that replays a scripted response queue per (instrument, source).
struct ScriptedFetcher {
    scripts: Mutex<HashMap<(String, Source), Script>>,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
        }
    }

    fn script(
        self,
        instrument_key: &str,
        source: Source,
        responses: Vec<Result<Vec<RawCandle>, FetchError>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert((instrument_key.to_string(), source), responses.into());
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        instrument_key: &str,
        request: &FetchRequest,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let mut scripts = self.scripts.lock().unwrap();
        scripts
            .get_mut(&(instrument_key.to_string(), request.source))
            .and_then(Script::pop_front)
            .unwrap_or_else(|| {
                Err(FetchError::Permanent(format!(
                    "no scripted response for {instrument_key}"
                )))
            })
    }
}

fn raw(timestamp: &str, close: f64) -> RawCandle {
    RawCandle {
        timestamp: timestamp.to_string(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 500,
    }
}

fn unit(symbol: &str, timeframe: Timeframe, source: Source) -> IngestionUnit {
    IngestionUnit {
        symbol: symbol.to_string(),
        instrument_key: format!("NSE_EQ|{symbol}"),
        timeframe,
        from: "2024-01-01".parse::<NaiveDate>().unwrap(),
        to: "2024-12-31".parse::<NaiveDate>().unwrap(),
        source,
    }
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        fetch_concurrency: 4,
        write_concurrency: 2,
        retry: RetryPolicy {
            max_rate_limit_retries: 3,
            default_rate_limit_delay_secs: 1,
            max_transient_retries: 3,
            transient_backoff_ms: 10,
        },
    }
}

fn pipeline(fetcher: ScriptedFetcher, dir: &TempDir) -> (IngestionPipeline, Arc<PartitionStore>) {
    let store = Arc::new(PartitionStore::new(dir.path()));
    let pipeline = IngestionPipeline::new(Arc::new(fetcher), Arc::clone(&store), test_config());
    (pipeline, store)
}

#[tokio::test(start_paused = true)]
async fn fetched_rows_land_sorted_and_in_utc() {
    let dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::new().script(
        "NSE_EQ|SBIN",
        Source::Intraday,
        vec![Ok(vec![
            raw("2024-06-03T09:30:00+05:30", 2.0),
            raw("2024-06-03T09:15:00+05:30", 1.0),
        ])],
    );
    let (pipeline, store) = pipeline(fetcher, &dir);

    let summary = pipeline
        .run(vec![unit("SBIN", Timeframe::Min15, Source::Intraday)])
        .await;

    assert_eq!(summary.succeeded(), 1);
    let stored = store.read(Timeframe::Min15, "SBIN").unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].close, 1.0);
    assert_eq!(
        stored[0].timestamp,
        "2024-06-03T03:45:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn rate_limited_unit_recovers_within_budget() {
    let dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::new().script(
        "NSE_EQ|SBIN",
        Source::Intraday,
        vec![
            Err(FetchError::RateLimited {
                retry_after: Some(Duration::from_secs(5)),
            }),
            Err(FetchError::RateLimited { retry_after: None }),
            Ok(vec![raw("2024-06-03T09:15:00Z", 1.0)]),
        ],
    );
    let (pipeline, store) = pipeline(fetcher, &dir);

    let summary = pipeline
        .run(vec![unit("SBIN", Timeframe::Min15, Source::Intraday)])
        .await;

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(store.read(Timeframe::Min15, "SBIN").unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retry_budget_fails_the_unit() {
    let dir = TempDir::new().unwrap();
    let throttle = || Err(FetchError::RateLimited { retry_after: None });
    let fetcher = ScriptedFetcher::new().script(
        "NSE_EQ|SBIN",
        Source::Intraday,
        vec![throttle(), throttle(), throttle(), throttle()],
    );
    let (pipeline, store) = pipeline(fetcher, &dir);

    let summary = pipeline
        .run(vec![unit("SBIN", Timeframe::Min15, Source::Intraday)])
        .await;

    assert_eq!(summary.failed(), 1);
    let report = summary.failures().next().unwrap();
    assert!(matches!(
        report.outcome,
        UnitOutcome::Failed {
            error: UnitError::Fetch(FetchError::RateLimited { .. })
        }
    ));
    assert!(store.read(Timeframe::Min15, "SBIN").unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn one_failed_unit_never_aborts_siblings() {
    let dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::new()
        .script(
            "NSE_EQ|BROKEN",
            Source::Historical,
            vec![Err(FetchError::Permanent("unknown instrument".to_string()))],
        )
        .script(
            "NSE_EQ|TCS",
            Source::Historical,
            vec![Ok(vec![raw("2024-06-03T00:00:00Z", 4000.0)])],
        );
    let (pipeline, store) = pipeline(fetcher, &dir);

    let summary = pipeline
        .run(vec![
            unit("BROKEN", Timeframe::Daily, Source::Historical),
            unit("TCS", Timeframe::Daily, Source::Historical),
        ])
        .await;

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(store.read(Timeframe::Daily, "TCS").unwrap().len(), 1);
    assert!(store.read(Timeframe::Daily, "BROKEN").unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn live_rows_never_clobber_stored_historical_bars() {
    let dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::new().script(
        "NSE_EQ|SBIN",
        Source::Intraday,
        vec![Ok(vec![
            raw("2024-06-03T09:15:00Z", 101.0),
            raw("2024-06-03T09:30:00Z", 102.0),
        ])],
    );
    let (pipeline, store) = pipeline(fetcher, &dir);

    // Pre-seed a confirmed bar at the conflicting instant.
    let mut confirmed = raw("2024-06-03T09:15:00Z", 100.0);
    confirmed.volume = 1;
    let seeded = candle_ingestor::models::candle::Candle::from_raw(
        "SBIN",
        "NSE_EQ|SBIN",
        Timeframe::Min15,
        Source::Historical,
        &confirmed,
    )
    .unwrap();
    store
        .atomic_replace(Timeframe::Min15, "SBIN", &[seeded.clone()])
        .unwrap();

    let summary = pipeline
        .run(vec![unit("SBIN", Timeframe::Min15, Source::Intraday)])
        .await;

    assert_eq!(summary.succeeded(), 1);
    let stored = store.read(Timeframe::Min15, "SBIN").unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0], seeded);
    assert_eq!(stored[1].close, 102.0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_units_on_one_partition_serialize_to_one_result() {
    let dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::new()
        .script(
            "NSE_EQ|SBIN",
            Source::Historical,
            vec![Ok(vec![raw("2024-06-03T09:15:00Z", 100.0)])],
        )
        .script(
            "NSE_EQ|SBIN",
            Source::Intraday,
            vec![Ok(vec![
                raw("2024-06-03T09:15:00Z", 101.0),
                raw("2024-06-03T09:30:00Z", 102.0),
            ])],
        );
    let (pipeline, store) = pipeline(fetcher, &dir);

    let summary = pipeline
        .run(vec![
            unit("SBIN", Timeframe::Min15, Source::Historical),
            unit("SBIN", Timeframe::Min15, Source::Intraday),
        ])
        .await;

    // Whichever order the two cycles ran in, precedence makes the final
    // content identical: the historical 09:15 bar plus the live 09:30 bar.
    assert_eq!(summary.succeeded(), 2);
    let stored = store.read(Timeframe::Min15, "SBIN").unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].close, 100.0);
    assert_eq!(stored[0].source, Source::Historical);
    assert_eq!(stored[1].close, 102.0);
    assert_eq!(stored[1].source, Source::Intraday);
}

#[tokio::test(start_paused = true)]
async fn empty_fetch_commits_nothing() {
    let dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::new().script("NSE_EQ|SBIN", Source::Intraday, vec![Ok(vec![])]);
    let (pipeline, store) = pipeline(fetcher, &dir);

    let summary = pipeline
        .run(vec![unit("SBIN", Timeframe::Min15, Source::Intraday)])
        .await;

    assert_eq!(summary.succeeded(), 1);
    match &summary.reports[0].outcome {
        UnitOutcome::Done { rows_written, .. } => assert_eq!(*rows_written, 0),
        other => panic!("expected Done, got {other:?}"),
    }
    assert!(!store.partition_dir(Timeframe::Min15, "SBIN").exists());
}

#[tokio::test(start_paused = true)]
async fn independent_partitions_proceed_in_parallel() {
    let dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::new()
        .script(
            "NSE_EQ|AAA",
            Source::Intraday,
            vec![Ok(vec![raw("2024-06-03T09:15:00Z", 1.0)])],
        )
        .script(
            "NSE_EQ|BBB",
            Source::Historical,
            vec![Ok(vec![raw("2024-06-03T00:00:00Z", 2.0)])],
        );
    let (pipeline, store) = pipeline(fetcher, &dir);

    let summary = pipeline
        .run(vec![
            unit("AAA", Timeframe::Min15, Source::Intraday),
            unit("BBB", Timeframe::Daily, Source::Historical),
        ])
        .await;

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(store.read(Timeframe::Min15, "AAA").unwrap().len(), 1);
    assert_eq!(store.read(Timeframe::Daily, "BBB").unwrap().len(), 1);
}
