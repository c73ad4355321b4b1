//! Core engine: the concurrent ranking-and-refresh loops.
//!
//! Startup builds the immutable universe and seeds the price snapshot
//! (from today's cache, or a full fetch). `run` then spawns one
//! background task per refresh tier and drives the recommendation loop
//! on the calling task until the session closes or Ctrl-C arrives, at
//! which point the shared active flag winds everything down
//! cooperatively.

pub mod ranking;
pub mod refresher;
pub mod state;

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::calendar::Calendar;
use crate::config::AppConfig;
use crate::quotes::QuoteSource;
use crate::report::{self, ReportSink};
use crate::storage;
use crate::strategy::{AllocationPolicy, ThresholdEstimator};
use crate::types::{RefreshTier, TickerStats, Universe};
use refresher::Refresher;
use state::{SharedState, StateSnapshot};

/// Grace period for in-flight work to observe the inactive flag before
/// the process exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Granularity of interruptible sleeps in the refresh loops.
const SLEEP_TICK: Duration = Duration::from_secs(1);

pub struct Engine {
    universe: Arc<Universe>,
    state: Arc<SharedState>,
    refresher: Arc<Refresher>,
    allocation: Arc<dyn AllocationPolicy>,
    calendar: Arc<dyn Calendar>,
    active: Arc<AtomicBool>,
    cache_path: PathBuf,
    tiers: Vec<RefreshTier>,
    window_days: usize,
    fund: Option<f64>,
    recommendation_interval: Duration,
}

impl Engine {
    /// Build the engine: derive per-ticker statistics, restore or seed
    /// the price snapshot, and publish the first ranking.
    ///
    /// Fatal only on an unusable universe or an unwritable cache
    /// directory; per-ticker estimator failures just shrink the
    /// universe.
    pub async fn bootstrap(
        cfg: &AppConfig,
        series: HashMap<String, Vec<f64>>,
        estimator: &dyn ThresholdEstimator,
        quotes: Arc<dyn QuoteSource>,
        allocation: Arc<dyn AllocationPolicy>,
        calendar: Arc<dyn Calendar>,
    ) -> Result<Self> {
        let look_back = cfg.universe.look_back_days;
        let mut stats: HashMap<String, TickerStats> = HashMap::new();
        for (ticker, closes) in &series {
            let slice = &closes[closes.len().saturating_sub(look_back)..];
            match estimator.estimate(slice) {
                Ok(s) => {
                    stats.insert(ticker.clone(), s);
                }
                Err(e) => {
                    warn!(%ticker, error = %e, "Excluding ticker from universe");
                }
            }
        }

        let universe = Arc::new(Universe::new(series, stats));
        if universe.is_empty() {
            bail!("No tickers with usable thresholds; cannot trade");
        }
        info!(tickers = universe.len(), "Universe ready");

        let cache_dir = Path::new(&cfg.storage.cache_dir);
        std::fs::create_dir_all(cache_dir).with_context(|| {
            format!("Cache directory unwritable: {}", cache_dir.display())
        })?;
        let cache_path = storage::cache_path(cache_dir, &calendar.trading_day());

        let active = Arc::new(AtomicBool::new(true));
        let state = Arc::new(SharedState::new());
        let refresher = Arc::new(Refresher::new(
            quotes,
            cfg.refresh.max_concurrency,
            Arc::clone(&active),
        ));

        let mut tiers: Vec<RefreshTier> = cfg
            .refresh
            .tiers
            .iter()
            .map(|t| RefreshTier {
                prefix: t.prefix,
                interval_secs: t.interval_secs,
            })
            .collect();
        tiers.push(RefreshTier {
            prefix: universe.len(),
            interval_secs: cfg.refresh.full_refresh_interval_secs,
        });

        // Today's cache skips the initial full fetch entirely.
        let seeded_from_cache = match storage::load_prices(&cache_path) {
            Some(prices) => {
                state.seed_prices(prices);
                true
            }
            None => {
                info!(tickers = universe.len(), "Seeding prices with a full fetch");
                refresher
                    .refresh_batch(&universe.tickers(), &state, &cache_path, true)
                    .await;
                false
            }
        };

        let prices = state.prices();
        let (initial_ranking, downs) = ranking::rerank(&universe, &prices, cfg.universe.window_days);
        let ranked = initial_ranking.len();
        state.publish_ranking(initial_ranking, downs);
        info!(ranked, from_cache = seeded_from_cache, "Initial ranking published");
        if !seeded_from_cache {
            // The seed fetch was a de-facto full-universe pass.
            state.mark_updated(cfg.refresh.full_refresh_interval_secs);
        }

        Ok(Self {
            universe,
            state,
            refresher,
            allocation,
            calendar,
            active,
            cache_path,
            tiers,
            window_days: cfg.universe.window_days,
            fund: cfg.engine.fund,
            recommendation_interval: Duration::from_secs(cfg.engine.recommendation_interval_secs),
        })
    }

    /// Shared state handle (integration tests inspect it).
    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    /// The configured refresh tiers, finest first, full universe last.
    pub fn tiers(&self) -> &[RefreshTier] {
        &self.tiers
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawn the refresh tiers and drive the recommendation loop until
    /// the session closes or a shutdown signal arrives.
    pub async fn run(&self, sink: &mut dyn ReportSink) -> Result<()> {
        for tier in &self.tiers {
            info!(%tier, "Starting refresh tier");
            tokio::spawn(run_tier(
                *tier,
                Arc::clone(&self.universe),
                Arc::clone(&self.state),
                Arc::clone(&self.refresher),
                Arc::clone(&self.active),
                self.cache_path.clone(),
                self.window_days,
            ));
        }

        let mut interval = tokio::time::interval(self.recommendation_interval);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.calendar.before_close() {
                        info!("Session close reached");
                        break;
                    }
                    self.recommendation_pass(sink);
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Cooperative shutdown: flag first, then give in-flight fetches
        // a moment to notice before the runtime tears them down.
        self.active.store(false, Ordering::SeqCst);
        tokio::time::sleep(SHUTDOWN_GRACE).await;

        if let Err(e) = self.state.save_cache(&self.cache_path) {
            error!(error = %e, "Final cache write failed");
        }
        Ok(())
    }

    /// One recommendation pass: snapshot, filter, allocate, report.
    fn recommendation_pass(&self, sink: &mut dyn ReportSink) {
        let snap = self.state.snapshot();
        let candidates = buy_candidates(&self.universe, &snap);
        let fractions = self.allocation.allocate(&candidates);

        // Keep ranking order; drop anything the policy returned that is
        // not a live ticker rather than failing the pass.
        let mut ordered: Vec<(String, f64)> = Vec::new();
        for ticker in &snap.ranking {
            if let Some(&fraction) = fractions.get(ticker) {
                if fraction > 0.0 {
                    ordered.push((ticker.clone(), fraction));
                }
            }
        }
        if ordered.len() < fractions.len() {
            warn!(
                returned = fractions.len(),
                usable = ordered.len(),
                "Allocation policy returned tickers outside the live ranking"
            );
        }

        let (rows, total_cost) = report::build_rows(
            &ordered,
            &self.universe,
            &snap.prices,
            &snap.down_percents,
            self.fund,
        );

        sink.emit(&report::session_header(&self.calendar.now_hms()));
        sink.emit(&report::render_table(
            &rows,
            self.window_days,
            self.fund,
            total_cost,
        ));
        sink.emit(&report::render_freshness(&snap.last_updates));
    }
}

/// Buy-eligible `(avg_return, ticker)` pairs in ranking order.
///
/// A ticker is eligible when the live price is below yesterday's close
/// and its drawdown has breached a strictly positive threshold.
pub fn buy_candidates(universe: &Universe, snap: &StateSnapshot) -> Vec<(f64, String)> {
    let mut candidates = Vec::new();
    for ticker in &snap.ranking {
        let Some(&price) = snap.prices.get(ticker) else {
            continue;
        };
        let Some(&down) = snap.down_percents.get(ticker) else {
            continue;
        };
        let Some(stats) = universe.stats(ticker) else {
            continue;
        };
        let Some(last_close) = universe.last_close(ticker) else {
            continue;
        };
        if price < last_close && down > stats.threshold && stats.threshold > 0.0 {
            candidates.push((stats.avg_return, ticker.clone()));
        }
    }
    candidates
}

/// One refresh tier's endless loop: read the ranking prefix, refresh it,
/// re-rank, stamp the pass, sleep.
async fn run_tier(
    tier: RefreshTier,
    universe: Arc<Universe>,
    state: Arc<SharedState>,
    refresher: Arc<Refresher>,
    active: Arc<AtomicBool>,
    cache_path: PathBuf,
    window_days: usize,
) {
    while active.load(Ordering::SeqCst) {
        let symbols = state.ranking_prefix(tier.prefix);
        // Network work happens outside any lock.
        refresher
            .refresh_batch(&symbols, &state, &cache_path, false)
            .await;
        if !active.load(Ordering::SeqCst) {
            break;
        }

        let prices = state.prices();
        let (new_ranking, downs) = ranking::rerank(&universe, &prices, window_days);
        state.publish_ranking(new_ranking, downs);
        state.mark_updated(tier.interval_secs);

        sleep_while_active(Duration::from_secs(tier.interval_secs), &active).await;
    }
    debug!(%tier, "Refresh tier stopped");
}

/// Sleep for `total`, waking early as soon as the engine goes inactive.
async fn sleep_while_active(total: Duration, active: &AtomicBool) {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if !active.load(Ordering::SeqCst) {
            return;
        }
        let nap = remaining.min(SLEEP_TICK);
        tokio::time::sleep(nap).await;
        remaining = remaining.saturating_sub(nap);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
