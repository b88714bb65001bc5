//! Symbol catalog: maps exchange tickers to provider instrument keys.
//!
//! The catalog is a CSV of `symbol,isin` rows. Symbols are trimmed and
//! uppercased; instrument keys are built as `<SEGMENT>|<ISIN>`. File order
//! is preserved so ingestion runs walk symbols in a stable order.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

/// Default exchange segment for NSE cash equities.
pub const NSE_EQ_SEGMENT: &str = "NSE_EQ";

/// Errors loading the symbol catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The file could not be read or parsed as CSV.
    #[error("failed to read symbol catalog: {0}")]
    Csv(#[from] csv::Error),

    /// The same symbol appears twice; keys must be unique.
    #[error("duplicate symbol in catalog: {0}")]
    DuplicateSymbol(String),
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    symbol: String,
    isin: String,
}

/// An insertion-ordered mapping from symbol to instrument key.
#[derive(Debug, Clone)]
pub struct SymbolCatalog {
    entries: IndexMap<String, String>,
}

impl SymbolCatalog {
    /// Loads `symbol,isin` rows from a CSV file with a header row.
    ///
    /// Rows with a blank symbol or ISIN are skipped; a repeated symbol is an
    /// error rather than a silent overwrite.
    pub fn load_csv(path: &Path, segment: &str) -> Result<Self, CatalogError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut entries = IndexMap::new();

        for record in reader.deserialize::<CatalogRow>() {
            let row = record?;
            let symbol = row.symbol.trim().to_uppercase();
            let isin = row.isin.trim();
            if symbol.is_empty() || isin.is_empty() {
                continue;
            }
            let instrument_key = format!("{segment}|{isin}");
            if entries.insert(symbol.clone(), instrument_key).is_some() {
                return Err(CatalogError::DuplicateSymbol(symbol));
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the instrument key for a symbol.
    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.entries.get(symbol).map(String::as_str)
    }

    /// Iterates `(symbol, instrument_key)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(symbol, key)| (symbol.as_str(), key.as_str()))
    }
}
