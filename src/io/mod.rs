//! Durable, atomic storage of candle partitions as parquet files.

pub mod dataframe;
pub mod partition;

use thiserror::Error;

/// Errors from reading or replacing a partition on disk.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A Polars read/write operation failed.
    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// A stored partition does not match the expected schema.
    #[error("corrupt partition data: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        StoreError::Corrupt {
            message: message.into(),
        }
    }
}
