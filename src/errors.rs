use thiserror::Error;

/// The unified error type for the `candle_ingestor` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An error originating from a quote provider.
    #[error("Fetch error: {0}")]
    Fetch(#[from] crate::providers::FetchError),

    /// An error reading or replacing a partition on disk.
    #[error("Store error: {0}")]
    Store(#[from] crate::io::StoreError),

    /// An error loading the symbol catalog.
    #[error("Catalog error: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),

    /// An error related to configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
