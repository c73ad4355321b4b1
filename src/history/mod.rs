//! Historical series loading.
//!
//! Supplies the per-ticker daily closes the estimator and ranking engine
//! work from. The trait keeps the engine testable; the shipped
//! implementation reads per-ticker CSV flat files and pre-filters the
//! universe for data quality and minimum traded volume.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Minimum series length for a ticker to be usable at all.
const MIN_SERIES_LEN: usize = 30;

/// Provider of historical close series, pre-filtered to exclude
/// low-volume and data-quality-flagged tickers.
pub trait SeriesProvider: Send + Sync {
    /// Load every ticker's closes, oldest-first, at most
    /// `max_history_days` entries each.
    fn load_universe(&self, max_history_days: usize) -> Result<HashMap<String, Vec<f64>>>;
}

// ---------------------------------------------------------------------------
// CSV flat files
// ---------------------------------------------------------------------------

/// One row of a `<TICKER>.csv` file, oldest rows first.
#[derive(Debug, Deserialize)]
struct CsvBar {
    #[allow(dead_code)]
    date: String,
    close: f64,
    volume: f64,
}

/// Series provider backed by a directory of per-ticker CSV files.
pub struct CsvSeriesProvider {
    data_dir: PathBuf,
    min_avg_volume: f64,
}

impl CsvSeriesProvider {
    pub fn new(data_dir: impl Into<PathBuf>, min_avg_volume: f64) -> Self {
        Self {
            data_dir: data_dir.into(),
            min_avg_volume,
        }
    }

    /// Read one ticker file. Returns the closes plus the average volume.
    fn read_series(&self, path: &PathBuf) -> Result<(Vec<f64>, f64)> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open series file {}", path.display()))?;

        let mut closes = Vec::new();
        let mut volume_sum = 0.0;
        for record in reader.deserialize() {
            let bar: CsvBar = record
                .with_context(|| format!("Malformed row in {}", path.display()))?;
            closes.push(bar.close);
            volume_sum += bar.volume;
        }

        let avg_volume = if closes.is_empty() {
            0.0
        } else {
            volume_sum / closes.len() as f64
        };
        Ok((closes, avg_volume))
    }
}

impl SeriesProvider for CsvSeriesProvider {
    fn load_universe(&self, max_history_days: usize) -> Result<HashMap<String, Vec<f64>>> {
        let entries = std::fs::read_dir(&self.data_dir).with_context(|| {
            format!("Failed to read data directory {}", self.data_dir.display())
        })?;

        let mut universe = HashMap::new();
        let mut skipped_garbage = 0usize;
        let mut skipped_volume = 0usize;

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(ticker) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let ticker = ticker.to_uppercase();

            let (mut closes, avg_volume) = match self.read_series(&path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(%ticker, error = %e, "Skipping unreadable series");
                    skipped_garbage += 1;
                    continue;
                }
            };

            // Data-quality filter: short series or implausible closes.
            if closes.len() < MIN_SERIES_LEN
                || closes.iter().any(|c| !c.is_finite() || *c <= 0.0)
            {
                debug!(%ticker, len = closes.len(), "Skipping garbage series");
                skipped_garbage += 1;
                continue;
            }

            // Low-volume filter.
            if avg_volume < self.min_avg_volume {
                debug!(%ticker, avg_volume, "Skipping low-volume series");
                skipped_volume += 1;
                continue;
            }

            if closes.len() > max_history_days {
                closes.drain(..closes.len() - max_history_days);
            }
            universe.insert(ticker, closes);
        }

        if universe.is_empty() {
            bail!(
                "No usable series in {} ({} garbage, {} low-volume)",
                self.data_dir.display(),
                skipped_garbage,
                skipped_volume
            );
        }

        info!(
            loaded = universe.len(),
            skipped_garbage, skipped_volume, "Universe loaded"
        );
        Ok(universe)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
