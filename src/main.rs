use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use candle_ingestor::catalog::{NSE_EQ_SEGMENT, SymbolCatalog};
use candle_ingestor::config::PipelineConfig;
use candle_ingestor::io::partition::PartitionStore;
use candle_ingestor::models::candle::Source;
use candle_ingestor::models::timeframe::Timeframe;
use candle_ingestor::pipeline::{IngestionPipeline, IngestionUnit, UnitOutcome};
use candle_ingestor::providers::upstox::UpstoxFetcher;
use candle_ingestor::session::{completed_trading_day, is_after_market_close};

/// How far back the intraday-window timeframes reach by default.
const DEFAULT_INTRADAY_DAYS: i64 = 30;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Fetches OHLCV candles and merge-writes them into per-symbol parquet partitions"
)]
struct Cli {
    /// Directory holding the partition tree
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// CSV file with symbol,isin rows
    #[arg(long, default_value = "symbol_isin.csv")]
    symbols: PathBuf,

    /// Optional TOML file with pipeline settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backfill confirmed candles: monthly/weekly/daily from a start date,
    /// plus the recent hourly and 15-minute windows
    Historical {
        /// Start date for daily and higher timeframes (YYYY-MM-DD)
        #[arg(long, default_value = "2022-01-01")]
        from: NaiveDate,

        /// Start date for hourly/15m; defaults to 30 days back
        #[arg(long)]
        intraday_from: Option<NaiveDate>,
    },

    /// Pull today's live 15-minute candles, plus the final daily candle
    /// after market close
    Intraday {
        /// Earliest session to keep from the intraday feed (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
    },
}

fn build_units(command: &Commands, catalog: &SymbolCatalog) -> Vec<IngestionUnit> {
    let now = Utc::now();
    let today = completed_trading_day(now);
    let intraday_floor = today - Duration::days(DEFAULT_INTRADAY_DAYS);

    let mut units = Vec::new();
    for (symbol, instrument_key) in catalog.iter() {
        let unit = |timeframe: Timeframe, from: NaiveDate, source: Source| IngestionUnit {
            symbol: symbol.to_string(),
            instrument_key: instrument_key.to_string(),
            timeframe,
            from,
            to: today,
            source,
        };

        match command {
            Commands::Historical {
                from,
                intraday_from,
            } => {
                let intraday_from = intraday_from.unwrap_or(intraday_floor);
                units.push(unit(Timeframe::Monthly, *from, Source::Historical));
                units.push(unit(Timeframe::Weekly, *from, Source::Historical));
                units.push(unit(Timeframe::Daily, *from, Source::Historical));
                units.push(unit(Timeframe::Hourly, intraday_from, Source::Historical));
                units.push(unit(Timeframe::Min15, intraday_from, Source::Intraday));
            }
            Commands::Intraday { from } => {
                let from = from.unwrap_or(intraday_floor);
                units.push(unit(Timeframe::Min15, from, Source::Intraday));
                if is_after_market_close(now) {
                    units.push(unit(Timeframe::Daily, from, Source::IntradayFinal));
                }
            }
        }
    }
    units
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };

    let catalog = SymbolCatalog::load_csv(&cli.symbols, NSE_EQ_SEGMENT)?;
    info!(symbols = catalog.len(), "symbol catalog loaded");

    let fetcher = Arc::new(UpstoxFetcher::from_env()?);
    let store = Arc::new(PartitionStore::new(&cli.data_dir));
    let pipeline = IngestionPipeline::new(fetcher, store, config);

    let units = build_units(&cli.command, &catalog);
    let summary = pipeline.run(units).await;

    println!(
        "done: {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    for report in summary.failures() {
        if let UnitOutcome::Failed { error } = &report.outcome {
            println!(
                "  FAILED {} {} ({}): {error}",
                report.symbol, report.timeframe, report.source
            );
        }
    }

    // Per-unit failures are reported above but do not force a non-zero
    // exit; only fatal setup errors (catalog, token, config) do.
    Ok(())
}
