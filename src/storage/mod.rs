//! Price-cache persistence.
//!
//! One JSON file per trading day holding the full ticker→price map as of
//! the last completed refresh pass. The file lets a restarted engine skip
//! the expensive initial full fetch; a file from a different trading day
//! is simply never looked at, because the day is part of the file name.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Path of the price cache for a given trading day.
pub fn cache_path(cache_dir: &Path, trading_day: &str) -> PathBuf {
    cache_dir.join(format!("{trading_day}-prices.json"))
}

/// Load a cached price snapshot.
///
/// Returns `None` on a missing, unreadable, or corrupt file. All three
/// are a cache miss that triggers a full re-fetch, never an abort.
pub fn load_prices(path: &Path) -> Option<HashMap<String, f64>> {
    if !path.exists() {
        info!(path = %path.display(), "No price cache for today, starting fresh");
        return None;
    }

    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Price cache unreadable, refetching");
            return None;
        }
    };

    match serde_json::from_str::<HashMap<String, f64>>(&json) {
        Ok(prices) => {
            info!(path = %path.display(), count = prices.len(), "Price cache loaded");
            Some(prices)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Price cache corrupt, refetching");
            None
        }
    }
}

/// Persist the full price snapshot, replacing any previous file.
///
/// Callers serialize invocations through the shared state lock; this
/// function itself only writes.
pub fn save_prices(path: &Path, prices: &HashMap<String, f64>) -> Result<()> {
    let json = serde_json::to_string(prices).context("Failed to serialise price snapshot")?;
    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write price cache to {}", path.display()))?;
    debug!(path = %path.display(), count = prices.len(), "Price cache saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
