//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field that has a sensible default carries one, so a minimal
//! config file still produces a runnable engine.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub universe: UniverseConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Total fund to spread across recommendations. When absent the
    /// report shows proportions only, no cost or share counts.
    #[serde(default)]
    pub fund: Option<f64>,
    #[serde(default = "default_recommendation_interval")]
    pub recommendation_interval_secs: u64,
    /// Local hour after which the trading session is considered closed.
    #[serde(default = "default_close_hour")]
    pub session_close_hour: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UniverseConfig {
    /// Directory of per-ticker CSV files (`<TICKER>.csv`).
    pub data_dir: String,
    #[serde(default = "default_max_history")]
    pub max_history_days: usize,
    /// Look-back window handed to the threshold estimator.
    #[serde(default = "default_look_back")]
    pub look_back_days: usize,
    /// Trailing window for the drawdown (down-percent) computation.
    #[serde(default = "default_window")]
    pub window_days: usize,
    /// Tickers averaging less volume than this are excluded.
    #[serde(default = "default_min_avg_volume")]
    pub min_avg_volume: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    /// Maximum concurrent quote fetches per refresh pass.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Ranked-prefix refresh tiers, finest first.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
    /// Interval of the full-universe refresh tier.
    #[serde(default = "default_full_interval")]
    pub full_refresh_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            tiers: default_tiers(),
            full_refresh_interval_secs: default_full_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TierConfig {
    pub prefix: usize,
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AllocationConfig {
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    /// Hard cap on any single position's fraction of the fund.
    #[serde(default = "default_max_fraction")]
    pub max_fraction: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_positions: default_max_positions(),
            max_fraction: default_max_fraction(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_recommendation_interval() -> u64 {
    100
}
fn default_close_hour() -> u32 {
    16
}
fn default_max_history() -> usize {
    1000
}
fn default_look_back() -> usize {
    250
}
fn default_window() -> usize {
    10
}
fn default_min_avg_volume() -> f64 {
    100_000.0
}
fn default_max_concurrency() -> usize {
    5
}
fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            prefix: 10,
            interval_secs: 60,
        },
        TierConfig {
            prefix: 100,
            interval_secs: 600,
        },
    ]
}
fn default_full_interval() -> u64 {
    2400
}
fn default_max_positions() -> usize {
    5
}
fn default_max_fraction() -> f64 {
    0.5
}
fn default_cache_dir() -> String {
    "cache".to_string()
}
fn default_output_dir() -> String {
    "outputs".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }
}
