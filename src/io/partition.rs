//! Atomic read/replace of one `(timeframe, symbol)` partition on disk.
//!
//! Layout: `{root}/timeframe=<tf>/symbol=<SYMBOL>/data.parquet` (Hive
//! style). A replace writes the full snapshot to a sibling
//! `data.parquet.tmp` in the same directory, then renames it over the
//! target in one step. A process killed before the rename leaves the
//! previous snapshot completely untouched; the stale temp file is simply
//! overwritten by the next replace.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use crate::io::StoreError;
use crate::io::dataframe::{candles_to_dataframe, dataframe_to_candles};
use crate::models::candle::Candle;
use crate::models::timeframe::Timeframe;

/// Name of the data file inside every partition directory.
pub const DATA_FILE: &str = "data.parquet";

const TMP_FILE: &str = "data.parquet.tmp";

/// Owns the on-disk partition tree under one root directory.
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the partition tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one partition: `{root}/timeframe=<tf>/symbol=<SYMBOL>`.
    pub fn partition_dir(&self, timeframe: Timeframe, symbol: &str) -> PathBuf {
        self.root
            .join(format!("timeframe={}", timeframe.as_str()))
            .join(format!("symbol={symbol}"))
    }

    /// Path of a partition's data file.
    pub fn partition_path(&self, timeframe: Timeframe, symbol: &str) -> PathBuf {
        self.partition_dir(timeframe, symbol).join(DATA_FILE)
    }

    /// Reads the full row set of a partition, sorted as stored.
    ///
    /// A partition that does not exist yet reads as an empty vec, never as
    /// an error.
    pub fn read(&self, timeframe: Timeframe, symbol: &str) -> Result<Vec<Candle>, StoreError> {
        let path = self.partition_path(timeframe, symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path)?;
        let df = ParquetReader::new(file).finish()?;
        dataframe_to_candles(&df)
    }

    /// Replaces the partition's snapshot with `rows`.
    ///
    /// At every observable instant either the old complete snapshot or the
    /// new complete snapshot is visible. An empty `rows` performs no I/O and
    /// leaves whatever is stored untouched.
    pub fn atomic_replace(
        &self,
        timeframe: Timeframe,
        symbol: &str,
        rows: &[Candle],
    ) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let dir = self.partition_dir(timeframe, symbol);
        fs::create_dir_all(&dir)?;
        let path = dir.join(DATA_FILE);
        let tmp = dir.join(TMP_FILE);

        let mut df = candles_to_dataframe(rows)?;
        let file = File::create(&tmp)?;
        ParquetWriter::new(file).finish(&mut df)?;

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(
            timeframe = %timeframe,
            symbol,
            rows = rows.len(),
            path = %path.display(),
            "partition replaced"
        );
        Ok(())
    }
}
