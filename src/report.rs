//! Recommendation reporting.
//!
//! Renders the buy table and the freshness line, and tees the text to
//! stdout plus a per-trading-day output file. Formatting only; every
//! number is computed before it gets here, except the cost/share
//! arithmetic that depends on the fund.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::Path;
use tracing::warn;

use crate::types::Universe;

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Receives each formatted report block.
pub trait ReportSink: Send {
    fn emit(&mut self, text: &str);
}

/// Sink that writes to stdout and, when configured, appends to the
/// trading day's output file.
pub struct TeeSink {
    file: Option<File>,
}

impl TeeSink {
    /// Sink appending to `<output_dir>/<trading_day>.txt`.
    pub fn new(output_dir: &Path, trading_day: &str) -> Result<Self> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Output directory unwritable: {}", output_dir.display())
        })?;
        let path = output_dir.join(format!("{trading_day}.txt"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open output file {}", path.display()))?;
        Ok(Self { file: Some(file) })
    }

    /// Stdout-only sink.
    pub fn stdout_only() -> Self {
        Self { file: None }
    }
}

impl ReportSink for TeeSink {
    fn emit(&mut self, text: &str) {
        println!("{text}");
        if let Some(file) = &mut self.file {
            if let Err(e) = writeln!(file, "{text}") {
                warn!(error = %e, "Failed to append report to output file");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One line of the recommendation table.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingRow {
    pub ticker: String,
    pub proportion: f64,
    /// Day-over-day change vs yesterday's close.
    pub today_change: f64,
    /// Trailing-window drawdown (positive = below the window high).
    pub window_change: f64,
    pub threshold: f64,
    pub price: f64,
    pub cost: Option<f64>,
    pub shares: Option<f64>,
}

/// Resolve allocation fractions into table rows.
///
/// `ordered` carries `(ticker, fraction)` in ranking order. A ticker the
/// engine has no price or history for is dropped with a warning; an
/// allocation policy handing back an unknown name must never take down
/// a recommendation pass. Returns the rows plus the summed cost of the
/// rounded share counts.
pub fn build_rows(
    ordered: &[(String, f64)],
    universe: &Universe,
    prices: &HashMap<String, f64>,
    down_percents: &HashMap<String, f64>,
    fund: Option<f64>,
) -> (Vec<TradingRow>, f64) {
    let mut rows = Vec::with_capacity(ordered.len());
    let mut total_cost = 0.0;

    for (ticker, fraction) in ordered {
        let (Some(&price), Some(last_close), Some(stats)) = (
            prices.get(ticker),
            universe.last_close(ticker),
            universe.stats(ticker),
        ) else {
            warn!(%ticker, "Dropping allocated ticker with no live data");
            continue;
        };
        let down = down_percents.get(ticker).copied().unwrap_or(0.0);

        let (cost, shares) = match fund {
            Some(fund) => {
                let value = fund * fraction;
                let shares = (value / price).round();
                let cost = shares * price;
                total_cost += cost;
                (Some(cost), Some(shares))
            }
            None => (None, None),
        };

        rows.push(TradingRow {
            ticker: ticker.clone(),
            proportion: *fraction,
            today_change: (price - last_close) / last_close,
            window_change: down,
            threshold: stats.threshold,
            price,
            cost,
            shares,
        });
    }

    (rows, total_cost)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Header block for one recommendation pass.
pub fn session_header(now_hms: &str) -> String {
    format!("===== {now_hms} =====")
}

/// Render the recommendation table.
///
/// Drawdown and threshold print negated, matching how traders read them
/// (a 10% drawdown shows as -10.00%).
pub fn render_table(
    rows: &[TradingRow],
    window_days: usize,
    fund: Option<f64>,
    total_cost: f64,
) -> String {
    if rows.is_empty() {
        return "(no buy recommendations this pass)".to_string();
    }

    let mut out = String::new();
    let _ = write!(
        out,
        "{:<8} {:>10} {:>13} {:>13} {:>10} {:>10}",
        "Symbol",
        "Proportion",
        "Today Change",
        format!("{window_days}d Change"),
        "Threshold",
        "Price",
    );
    if fund.is_some() {
        let _ = write!(out, " {:>12} {:>9}", "Cost", "Quantity");
    }
    out.push('\n');
    let width = if fund.is_some() { 91 } else { 68 };
    let _ = writeln!(out, "{:-<width$}", "");

    for row in rows {
        let _ = write!(
            out,
            "{:<8} {:>9.2}% {:>12.2}% {:>12.2}% {:>9.2}% {:>10.2}",
            row.ticker,
            row.proportion * 100.0,
            row.today_change * 100.0,
            -row.window_change * 100.0,
            -row.threshold * 100.0,
            row.price,
        );
        if let (Some(cost), Some(shares)) = (row.cost, row.shares) {
            let _ = write!(out, " {:>12.2} {:>9.0}", cost, shares);
        }
        out.push('\n');
    }

    if let Some(fund) = fund {
        let _ = writeln!(out, "Fund: {fund:.2}");
        let _ = write!(out, "Actual Cost: {total_cost:.2}");
    } else {
        out.pop();
    }
    out
}

/// Render the per-tier freshness line, finest interval first.
pub fn render_freshness(last_updates: &BTreeMap<u64, DateTime<Local>>) -> String {
    if last_updates.is_empty() {
        return "Last updates: (none yet)".to_string();
    }
    let parts: Vec<String> = last_updates
        .iter()
        .map(|(interval, stamp)| {
            format!("{}: {}", interval_label(*interval), stamp.format("%H:%M:%S"))
        })
        .collect();
    format!("Last updates: {}", parts.join(" | "))
}

/// Human label for a refresh interval: 60 -> "1m", 2400 -> "40m".
pub fn interval_label(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
