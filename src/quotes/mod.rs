//! Quote sources.
//!
//! Defines the `QuoteSource` trait the refresher fetches through, and the
//! Yahoo Finance implementation used by the binary. A failed fetch is
//! simply "unavailable": the caller logs it and keeps the stale price.

pub mod yahoo;

use anyhow::Result;
use async_trait::async_trait;

/// Abstraction over a real-time quote provider.
///
/// Implementors return the current price for a ticker, or an error when
/// the quote is unavailable. Callers must treat every error as a benign
/// miss: transport failures, parse failures, and delisted tickers all
/// look the same from the engine's point of view.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the current price for a single ticker.
    async fn fetch_price(&self, ticker: &str) -> Result<f64>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}
