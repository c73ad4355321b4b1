//! Yahoo Finance real-time quote source.
//!
//! Scrapes the public quote page rather than an authenticated API: the
//! current price is embedded in the page's JSON payload under
//! `"currentPrice"` or `"regularMarketPrice"`. No key required.
//!
//! Base URL: https://finance.yahoo.com/quote/{ticker}

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::QuoteSource;

const BASE_URL: &str = "https://finance.yahoo.com/quote";
const SOURCE_NAME: &str = "yahoo";

/// JSON keys scanned for, in priority order.
const PRICE_KEYS: &[&str] = &["\"currentPrice\"", "\"regularMarketPrice\""];

/// Per-request timeout. A hung fetch must not stall the whole pool.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Yahoo Finance quote client.
pub struct YahooQuoteClient {
    http: Client,
}

impl YahooQuoteClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0 (compatible; dipscan/0.1)")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteClient {
    async fn fetch_price(&self, ticker: &str) -> Result<f64> {
        let url = format!("{BASE_URL}/{ticker}");
        let body = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Quote request failed for {ticker}"))?
            .error_for_status()
            .with_context(|| format!("Quote request rejected for {ticker}"))?
            .text()
            .await
            .with_context(|| format!("Quote body unreadable for {ticker}"))?;

        let price = extract_price(&body)
            .ok_or_else(|| anyhow!("No price field found for {ticker}"))?;
        debug!(ticker, price, "Quote fetched");
        Ok(price)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

/// Scan a quote-page body for the first recognised price key and parse
/// the number that follows it.
fn extract_price(body: &str) -> Option<f64> {
    for key in PRICE_KEYS {
        if let Some(at) = body.find(key) {
            if let Some(price) = parse_number_after(&body[at + key.len()..]) {
                return Some(price);
            }
        }
    }
    None
}

/// Parse the first numeric literal in `rest`, skipping the `:`, quotes,
/// and wrapper objects (`{"raw":123.45,...}`) Yahoo uses.
fn parse_number_after(rest: &str) -> Option<f64> {
    let start = rest.find(|c: char| c.is_ascii_digit())?;
    // Bail if the key's value is something else entirely (digit too far out).
    if start > 24 {
        return None;
    }
    let tail = &rest[start..];
    let end = tail
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(tail.len());
    tail[..end].parse::<f64>().ok()
}
