//! DIPSCAN: drawdown-ranked live buy scanner
//!
//! Entry point. Loads configuration, initialises structured logging,
//! loads the historical universe, and runs the live ranking-and-refresh
//! engine until the session closes.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use dipscan::calendar::{Calendar, SystemCalendar};
use dipscan::config;
use dipscan::engine::Engine;
use dipscan::history::{CsvSeriesProvider, SeriesProvider};
use dipscan::quotes::yahoo::YahooQuoteClient;
use dipscan::report::TeeSink;
use dipscan::strategy::{DrawdownEstimator, ProportionalAllocator};

const BANNER: &str = r#"
  ____ ___ ____  ____   ____    _    _   _
 |  _ \_ _|  _ \/ ___| / ___|  / \  | \ | |
 | | | | || |_) \___ \| |     / _ \ |  \| |
 | |_| | ||  __/ ___) | |___ / ___ \| |\  |
 |____/___|_|   |____/ \____/_/   \_\_| \_|

  Drawdown-ranked live buy scanner
  v0.1.0
"#;

/// Minimum historical threshold breaches the estimator must see before
/// it will trust a ticker.
const MIN_BREACH_SAMPLES: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        fund = ?cfg.engine.fund,
        tiers = cfg.refresh.tiers.len() + 1,
        close_hour = cfg.engine.session_close_hour,
        "DIPSCAN starting up"
    );

    // -- Historical universe ---------------------------------------------

    let provider = CsvSeriesProvider::new(&cfg.universe.data_dir, cfg.universe.min_avg_volume);
    let series = provider.load_universe(cfg.universe.max_history_days)?;

    // -- Collaborators ----------------------------------------------------

    let estimator = DrawdownEstimator::new(cfg.universe.window_days, MIN_BREACH_SAMPLES);
    let quotes = Arc::new(YahooQuoteClient::new()?);
    let allocation = Arc::new(ProportionalAllocator::new(
        cfg.allocation.max_positions,
        cfg.allocation.max_fraction,
    ));
    let calendar: Arc<dyn Calendar> =
        Arc::new(SystemCalendar::new(cfg.engine.session_close_hour));

    let mut sink = TeeSink::new(
        std::path::Path::new(&cfg.report.output_dir),
        &calendar.trading_day(),
    )?;

    // -- Engine -----------------------------------------------------------

    let engine = Engine::bootstrap(
        &cfg,
        series,
        &estimator,
        quotes,
        allocation,
        Arc::clone(&calendar),
    )
    .await?;

    info!(
        trading_day = %calendar.trading_day(),
        interval_secs = cfg.engine.recommendation_interval_secs,
        "Entering recommendation loop. Press Ctrl+C to stop."
    );
    engine.run(&mut sink).await?;

    info!("DIPSCAN shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dipscan=info"));

    let json_logging = std::env::var("DIPSCAN_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
