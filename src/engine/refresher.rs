//! Worker-pool price refresher.
//!
//! Fetches a batch of tickers through the quote source, at most
//! `max_concurrency` in flight at once, then persists the updated price
//! snapshot. A failed fetch leaves the prior price authoritative. The
//! shared active flag is consulted before dispatching and before
//! consuming every unit of work, so shutdown interrupts a pass promptly
//! instead of draining the whole batch.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::engine::state::SharedState;
use crate::quotes::QuoteSource;

/// Log a progress line every this many completed seed fetches.
const PROGRESS_EVERY: usize = 25;

pub struct Refresher {
    quotes: Arc<dyn QuoteSource>,
    max_concurrency: usize,
    active: Arc<AtomicBool>,
}

impl Refresher {
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        max_concurrency: usize,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            quotes,
            max_concurrency: max_concurrency.max(1),
            active,
        }
    }

    /// Fetch every ticker in the batch and fold the successes into the
    /// shared price map, then persist the cache.
    ///
    /// Returns early (without persisting) when the engine goes inactive
    /// mid-pass; tasks already in flight notice the flag themselves and
    /// finish quietly.
    pub async fn refresh_batch(
        &self,
        tickers: &[String],
        state: &Arc<SharedState>,
        cache_path: &Path,
        log_progress: bool,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(tickers.len());

        for ticker in tickers {
            if !self.active.load(Ordering::SeqCst) {
                debug!("Refresh pass interrupted before dispatch");
                return;
            }

            let quotes = Arc::clone(&self.quotes);
            let active = Arc::clone(&self.active);
            let semaphore = Arc::clone(&semaphore);
            let ticker = ticker.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (ticker, None),
                };
                if !active.load(Ordering::SeqCst) {
                    return (ticker, None);
                }
                match quotes.fetch_price(&ticker).await {
                    Ok(price) if price.is_finite() && price > 0.0 => (ticker, Some(price)),
                    Ok(price) => {
                        warn!(%ticker, price, "Discarding implausible quote");
                        (ticker, None)
                    }
                    Err(e) => {
                        debug!(%ticker, error = %e, "Quote unavailable, keeping stale price");
                        (ticker, None)
                    }
                }
            }));
        }

        let total = handles.len();
        let mut updated = 0usize;
        for (done, handle) in handles.into_iter().enumerate() {
            if !self.active.load(Ordering::SeqCst) {
                debug!("Refresh pass interrupted mid-consume");
                return;
            }
            match handle.await {
                Ok((ticker, Some(price))) => {
                    state.apply_quote(&ticker, price);
                    updated += 1;
                }
                Ok((_, None)) => {}
                Err(e) => warn!(error = %e, "Quote task failed"),
            }
            if log_progress && (done + 1) % PROGRESS_EVERY == 0 {
                info!(done = done + 1, total, "Seed fetch progress");
            }
        }

        // Persist the whole snapshot; the state lock serializes writers.
        if let Err(e) = state.save_cache(cache_path) {
            error!(error = %e, "Failed to persist price cache");
        } else {
            debug!(updated, total, "Refresh pass complete");
        }
    }
}
