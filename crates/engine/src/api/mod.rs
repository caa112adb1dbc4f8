//! Market data providers

pub mod yahoo;

pub use yahoo::YahooClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::PriceSeries;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider error {code}: {description}")]
    Provider { code: String, description: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Source of daily price history, one symbol at a time
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_series(&self, symbol: &str) -> Result<PriceSeries, FetchError>;
}
