//! Shared types for the DIPSCAN engine.
//!
//! These types form the data model used across all modules. Everything
//! here is immutable after startup; the mutable live state (prices,
//! ranking, freshness stamps) lives in `engine::state`.

use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Per-ticker statistics
// ---------------------------------------------------------------------------

/// Buy-signal statistics derived once at startup from a ticker's
/// look-back window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickerStats {
    /// Mean next-day return observed at historical threshold breaches.
    /// Used as the candidate weight handed to the allocation policy.
    pub avg_return: f64,
    /// Drawdown level beyond which the ticker becomes a buy candidate.
    pub threshold: f64,
}

impl fmt::Display for TickerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg_return={:.2}% threshold={:.2}%",
            self.avg_return * 100.0,
            self.threshold * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Universe
// ---------------------------------------------------------------------------

/// The immutable trading universe: historical closes plus derived
/// per-ticker statistics.
///
/// Built once at startup and shared read-only for the process lifetime,
/// so the refresh loops never need a lock to consult it. Only tickers
/// with both a usable series and usable statistics are retained.
pub struct Universe {
    series: HashMap<String, Vec<f64>>,
    stats: HashMap<String, TickerStats>,
}

impl Universe {
    /// Build a universe from historical closes and their derived stats.
    /// Tickers missing from either map are dropped.
    pub fn new(
        mut series: HashMap<String, Vec<f64>>,
        mut stats: HashMap<String, TickerStats>,
    ) -> Self {
        series.retain(|ticker, _| stats.contains_key(ticker));
        stats.retain(|ticker, _| series.contains_key(ticker));
        Self { series, stats }
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// All tickers, sorted for deterministic iteration.
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.series.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    pub fn series(&self, ticker: &str) -> Option<&[f64]> {
        self.series.get(ticker).map(Vec::as_slice)
    }

    pub fn stats(&self, ticker: &str) -> Option<&TickerStats> {
        self.stats.get(ticker)
    }

    /// Most recent historical close for a ticker.
    pub fn last_close(&self, ticker: &str) -> Option<f64> {
        self.series.get(ticker).and_then(|s| s.last().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<f64>)> {
        self.series.iter()
    }
}

// ---------------------------------------------------------------------------
// Refresh tiers
// ---------------------------------------------------------------------------

/// One refresh cadence: the first `prefix` tickers of the current ranking
/// are re-fetched every `interval_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTier {
    pub prefix: usize,
    pub interval_secs: u64,
}

impl fmt::Display for RefreshTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "top {} every {}s", self.prefix, self.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for DIPSCAN.
#[derive(Debug, thiserror::Error)]
pub enum DipscanError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("historical data error: {0}")]
    History(String),

    #[error("estimator error: {0}")]
    Estimator(String),

    #[error("storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
