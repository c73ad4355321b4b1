//! Shared live state.
//!
//! The single mutable resource in the process: current prices, the
//! published ranking, per-ticker drawdowns, and per-tier freshness
//! stamps. Everything is owned by `SharedState` behind one mutex;
//! callers only get atomic snapshots and short read-modify-write
//! operations, never a reference into the backing containers. No method
//! is called with the lock already held and nothing holds the lock
//! across an await.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::storage;

/// A coherent copy of the live state, captured under the lock in one go.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub ranking: Vec<String>,
    pub prices: HashMap<String, f64>,
    pub down_percents: HashMap<String, f64>,
    pub last_updates: BTreeMap<u64, DateTime<Local>>,
}

#[derive(Default)]
struct Inner {
    prices: HashMap<String, f64>,
    ranking: Vec<String>,
    down_percents: HashMap<String, f64>,
    /// Keyed by refresh interval seconds; value is the tier's last
    /// completed pass.
    last_updates: BTreeMap<u64, DateTime<Local>>,
}

/// Owner of all mutable shared state.
#[derive(Default)]
pub struct SharedState {
    inner: Mutex<Inner>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the price map wholesale (cache restore at startup).
    pub fn seed_prices(&self, prices: HashMap<String, f64>) {
        self.lock().prices = prices;
    }

    /// Record one fetched quote. Prices are only ever added or
    /// overwritten, never removed.
    pub fn apply_quote(&self, ticker: &str, price: f64) {
        self.lock().prices.insert(ticker.to_string(), price);
    }

    /// The first `n` tickers of the current ranking.
    pub fn ranking_prefix(&self, n: usize) -> Vec<String> {
        self.lock().ranking.iter().take(n).cloned().collect()
    }

    /// Copy of the current price map.
    pub fn prices(&self) -> HashMap<String, f64> {
        self.lock().prices.clone()
    }

    pub fn price_count(&self) -> usize {
        self.lock().prices.len()
    }

    /// Replace the ranking and drawdown map wholesale. Readers either
    /// see the old pair or the new pair, never a mix.
    pub fn publish_ranking(&self, ranking: Vec<String>, down_percents: HashMap<String, f64>) {
        let mut inner = self.lock();
        inner.ranking = ranking;
        inner.down_percents = down_percents;
    }

    /// Stamp a refresh tier's completed pass.
    pub fn mark_updated(&self, interval_secs: u64) {
        self.lock().last_updates.insert(interval_secs, Local::now());
    }

    /// Capture a coherent snapshot of everything under one acquisition.
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.lock();
        StateSnapshot {
            ranking: inner.ranking.clone(),
            prices: inner.prices.clone(),
            down_percents: inner.down_percents.clone(),
            last_updates: inner.last_updates.clone(),
        }
    }

    /// Persist the price map while holding the state lock, so concurrent
    /// refresh passes cannot interleave partial cache writes.
    pub fn save_cache(&self, path: &Path) -> Result<()> {
        let inner = self.lock();
        storage::save_prices(path, &inner.prices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
