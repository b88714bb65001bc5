//! Upstox REST fetcher (v3 candle endpoints).
//!
//! Two endpoint families serve candles:
//!
//! - `GET /historical-candle/{key}/{unit}/{interval}/{to}/{from}`: the
//!   date-ranged archive of confirmed bars;
//! - `GET /historical-candle/intraday/{key}/{unit}/{interval}`: the live
//!   feed for the current session.
//!
//! Candle rows arrive as JSON arrays
//! `[timestamp, open, high, low, close, volume, open_interest]`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::candle::{RawCandle, Source};
use crate::providers::{FetchError, FetchRequest, Fetcher};

const BASE_URL: &str = "https://api.upstox.com/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while constructing the fetcher.
#[derive(Debug, Error)]
pub enum UpstoxInitError {
    /// The access-token environment variable is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The access token contains characters not valid in a header.
    #[error("Invalid access token format: {0}")]
    InvalidToken(#[from] header::InvalidHeaderValue),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// [`Fetcher`] implementation backed by the Upstox REST API.
pub struct UpstoxFetcher {
    client: Client,
    base_url: String,
    _access_token: SecretString,
}

impl UpstoxFetcher {
    /// Creates a fetcher reading the token from `UPSTOX_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self, UpstoxInitError> {
        let token = std::env::var("UPSTOX_ACCESS_TOKEN")
            .map_err(|_| UpstoxInitError::MissingEnvVar("UPSTOX_ACCESS_TOKEN".to_string()))?;
        Self::new(SecretString::new(token.into()))
    }

    /// Creates a fetcher with an explicit bearer token.
    pub fn new(access_token: SecretString) -> Result<Self, UpstoxInitError> {
        Self::with_base_url(access_token, BASE_URL)
    }

    fn with_base_url(
        access_token: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, UpstoxInitError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let mut auth = header::HeaderValue::from_str(&format!(
            "Bearer {}",
            access_token.expose_secret()
        ))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            _access_token: access_token,
        })
    }

    fn endpoint(&self, instrument_key: &str, request: &FetchRequest) -> String {
        let (unit, interval) = request.timeframe.api_unit();
        // Instrument keys embed '|', which is not valid raw in a URL path.
        let key = instrument_key.replace('|', "%7C");
        match request.source {
            Source::Historical => format!(
                "{}/historical-candle/{key}/{unit}/{interval}/{}/{}",
                self.base_url, request.to, request.from
            ),
            Source::Intraday | Source::IntradayFinal => format!(
                "{}/historical-candle/intraday/{key}/{unit}/{interval}",
                self.base_url
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstoxResponse {
    #[serde(default)]
    data: Option<CandlePayload>,
}

#[derive(Debug, Default, Deserialize)]
struct CandlePayload {
    #[serde(default)]
    candles: Vec<Vec<Value>>,
}

fn parse_row(row: &[Value]) -> Result<RawCandle, FetchError> {
    if row.len() < 6 {
        return Err(FetchError::Permanent(format!(
            "candle row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let timestamp = row[0]
        .as_str()
        .ok_or_else(|| FetchError::Permanent("candle timestamp is not a string".to_string()))?
        .to_string();
    let number = |index: usize, name: &str| {
        row[index]
            .as_f64()
            .ok_or_else(|| FetchError::Permanent(format!("candle {name} is not a number")))
    };
    let volume = row[5]
        .as_i64()
        .or_else(|| row[5].as_f64().map(|v| v as i64))
        .ok_or_else(|| FetchError::Permanent("candle volume is not a number".to_string()))?;

    Ok(RawCandle {
        timestamp,
        open: number(1, "open")?,
        high: number(2, "high")?,
        low: number(3, "low")?,
        close: number(4, "close")?,
        volume,
    })
}

fn classify_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_decode() {
        FetchError::Permanent(format!("malformed response: {e}"))
    } else {
        // Timeouts, connection resets, and friends are all worth a retry.
        FetchError::Transient(e.to_string())
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl Fetcher for UpstoxFetcher {
    async fn fetch(
        &self,
        instrument_key: &str,
        request: &FetchRequest,
    ) -> Result<Vec<RawCandle>, FetchError> {
        let url = self.endpoint(instrument_key, request);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                retry_after: retry_after(&response),
            });
        }
        if status.is_server_error() {
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Permanent(format!("HTTP {status}: {body}")));
        }

        let payload: UpstoxResponse = response.json().await.map_err(classify_transport_error)?;
        let candles = payload.data.unwrap_or_default().candles;
        candles.iter().map(|row| parse_row(row)).collect()
    }
}
