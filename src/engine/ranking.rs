//! Ranking engine.
//!
//! Re-derives the total order over tickers from a price snapshot. Pure:
//! same universe, same snapshot, same ranking. The caller captures the
//! snapshot once before calling, so a refresh pass landing mid-sort can
//! never tear the inputs.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::Universe;

/// Distance-to-buy-signal sort key.
///
/// `primary` is how far the current drawdown sits from the ticker's
/// threshold; `secondary` is the day-over-day move, penalised by 1 when
/// the threshold has not been breached. The smaller of the two wins, so
/// a ticker ranks early either when it hovers near its threshold or when
/// it has already breached and is moving.
fn sort_score(down_percent: f64, threshold: f64, last_close: f64, price: f64) -> f64 {
    let primary = (down_percent - threshold).abs();
    let penalty = if down_percent < threshold { 1.0 } else { 0.0 };
    let secondary = ((last_close - price) / last_close).abs() + penalty;
    primary.min(secondary)
}

/// Trailing-window drawdown of `price` against the series tail.
fn down_percent(series: &[f64], price: f64, window_days: usize) -> Option<f64> {
    let tail = &series[series.len().saturating_sub(window_days)..];
    let high = tail.iter().cloned().fold(f64::MIN, f64::max);
    if high <= 0.0 {
        return None;
    }
    Some((high - price) / high)
}

/// Recompute the ranking and per-ticker drawdowns for every universe
/// ticker with a known price.
///
/// Ascending by score; ties broken by ticker so the order never depends
/// on map iteration. The result is always a permutation of the universe
/// tickers present in `prices`.
pub fn rerank(
    universe: &Universe,
    prices: &HashMap<String, f64>,
    window_days: usize,
) -> (Vec<String>, HashMap<String, f64>) {
    let mut down_percents = HashMap::new();
    let mut scored: Vec<(f64, String)> = Vec::new();

    for (ticker, series) in universe.iter() {
        let Some(&price) = prices.get(ticker) else {
            continue;
        };
        let Some(stats) = universe.stats(ticker) else {
            continue;
        };
        let Some(down) = down_percent(series, price, window_days) else {
            continue;
        };
        let Some(&last_close) = series.last() else {
            continue;
        };

        down_percents.insert(ticker.clone(), down);
        // The day-over-day term must use this ticker's own price; a
        // single price shared across the loop corrupts the whole order.
        let score = sort_score(down, stats.threshold, last_close, price);
        scored.push((score, ticker.clone()));
    }

    scored.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let ranking = scored.into_iter().map(|(_, ticker)| ticker).collect();
    (ranking, down_percents)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TickerStats;

    fn universe(entries: &[(&str, Vec<f64>, f64)]) -> Universe {
        let mut series = HashMap::new();
        let mut stats = HashMap::new();
        for (ticker, closes, threshold) in entries {
            series.insert(ticker.to_string(), closes.clone());
            stats.insert(
                ticker.to_string(),
                TickerStats {
                    avg_return: 0.01,
                    threshold: *threshold,
                },
            );
        }
        Universe::new(series, stats)
    }

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect()
    }

    /// Ten flat days at `high` ending on `last_close`.
    fn tail(high: f64, last_close: f64) -> Vec<f64> {
        let mut closes = vec![high; 10];
        closes.push(last_close);
        closes
    }

    #[test]
    fn test_down_percent() {
        let series = tail(100.0, 100.0);
        assert!((down_percent(&series, 90.0, 10).unwrap() - 0.10).abs() < 1e-10);
        assert!((down_percent(&series, 100.0, 10).unwrap() - 0.0).abs() < 1e-10);
        // Price above the trailing high gives a negative drawdown.
        assert!(down_percent(&series, 110.0, 10).unwrap() < 0.0);
    }

    #[test]
    fn test_rerank_only_priced_tickers() {
        let u = universe(&[
            ("AAA", tail(100.0, 100.0), 0.05),
            ("BBB", tail(100.0, 100.0), 0.05),
        ]);
        let (ranking, downs) = rerank(&u, &prices(&[("AAA", 95.0)]), 10);
        assert_eq!(ranking, vec!["AAA"]);
        assert!(!downs.contains_key("BBB"));
    }

    #[test]
    fn test_rerank_ignores_unknown_tickers_in_snapshot() {
        let u = universe(&[("AAA", tail(100.0, 100.0), 0.05)]);
        let snapshot = prices(&[("AAA", 95.0), ("GHOST", 1.0)]);
        let (ranking, downs) = rerank(&u, &snapshot, 10);
        assert_eq!(ranking, vec!["AAA"]);
        assert!(!downs.contains_key("GHOST"));
    }

    #[test]
    fn test_rerank_deterministic() {
        let u = universe(&[
            ("AAA", tail(100.0, 98.0), 0.05),
            ("BBB", tail(200.0, 195.0), 0.10),
            ("CCC", tail(50.0, 50.0), 0.02),
        ]);
        let snapshot = prices(&[("AAA", 93.0), ("BBB", 180.0), ("CCC", 49.0)]);
        let first = rerank(&u, &snapshot, 10);
        let second = rerank(&u, &snapshot, 10);
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn test_rerank_tie_break_lexicographic() {
        let u = universe(&[
            ("ZZZ", tail(100.0, 100.0), 0.05),
            ("AAA", tail(100.0, 100.0), 0.05),
        ]);
        let snapshot = prices(&[("ZZZ", 95.0), ("AAA", 95.0)]);
        let (ranking, _) = rerank(&u, &snapshot, 10);
        assert_eq!(ranking, vec!["AAA", "ZZZ"]);
    }

    #[test]
    fn test_secondary_term_uses_each_tickers_own_price() {
        // Identical drawdown (10%) and threshold (50%) for both tickers,
        // so primary terms match exactly; only the day-over-day term can
        // separate them, and it must come from each ticker's own price.
        let u = universe(&[
            ("AAA", tail(100.0, 95.0), 0.5),
            ("BBB", tail(200.0, 200.0), 0.5),
        ]);
        // AAA: down=(100-90)/100=0.10, day move |95-90|/95 ≈ 0.0526
        // BBB: down=(200-180)/200=0.10, day move |200-180|/200 = 0.10
        let (ranking, downs) = rerank(&u, &prices(&[("AAA", 90.0), ("BBB", 180.0)]), 10);
        assert!((downs["AAA"] - 0.10).abs() < 1e-10);
        assert!((downs["BBB"] - 0.10).abs() < 1e-10);
        assert_eq!(ranking, vec!["AAA", "BBB"]);

        // Swap which ticker sits closer to its last close; the order
        // must follow. A shared-price bug would keep the orders equal.
        let u = universe(&[
            ("AAA", tail(100.0, 100.0), 0.5),
            ("BBB", tail(200.0, 190.0), 0.5),
        ]);
        // AAA day move = 0.10, BBB day move = |190-180|/190 ≈ 0.0526
        let (ranking, _) = rerank(&u, &prices(&[("AAA", 90.0), ("BBB", 180.0)]), 10);
        assert_eq!(ranking, vec!["BBB", "AAA"]);
    }

    #[test]
    fn test_breached_ticker_ranks_first() {
        // A has breached (down 10% vs threshold 5%) and sits 1% below
        // yesterday's close, so its secondary term is tiny. B is short
        // of its threshold and picks up the +1 penalty, leaving only its
        // primary distance of 0.05.
        let u = universe(&[
            ("AAA", tail(100.0, 91.0), 0.05),
            ("BBB", tail(100.0, 100.0), 0.10),
        ]);
        let snapshot = prices(&[("AAA", 90.0), ("BBB", 95.0)]);
        let (ranking, downs) = rerank(&u, &snapshot, 10);
        assert!((downs["AAA"] - 0.10).abs() < 1e-10);
        assert!((downs["BBB"] - 0.05).abs() < 1e-10);
        assert_eq!(ranking, vec!["AAA", "BBB"]);
    }
}
