//! Per-ticker buy-threshold and average-return estimation.
//!
//! Given a look-back slice of daily closes, pick the drawdown level that
//! historically preceded the best next-day rebounds. The chosen level
//! becomes the ticker's buy threshold; the mean rebound at breaches of
//! that level becomes its candidate weight.

use std::cmp::Ordering;

use crate::types::{DipscanError, TickerStats};

/// Number of candidate threshold levels scanned between zero and the
/// deepest observed drawdown.
const CANDIDATE_STEPS: usize = 50;

/// Estimates `TickerStats` from a historical close series.
pub trait ThresholdEstimator: Send + Sync {
    /// Estimate over the given look-back slice (oldest-first closes).
    /// An error excludes the ticker from the universe.
    fn estimate(&self, series: &[f64]) -> Result<TickerStats, DipscanError>;
}

/// Threshold estimator scanning the observed drawdown distribution.
pub struct DrawdownEstimator {
    /// Trailing window for the drawdown computation, matching the one
    /// the live ranking uses.
    pub window_days: usize,
    /// Minimum historical breaches required to trust a threshold.
    pub min_samples: usize,
}

impl DrawdownEstimator {
    pub fn new(window_days: usize, min_samples: usize) -> Self {
        Self {
            window_days,
            min_samples,
        }
    }

    /// Daily `(drawdown, next_day_return)` observations over the slice.
    fn observations(&self, series: &[f64]) -> Vec<(f64, f64)> {
        let w = self.window_days;
        let mut obs = Vec::new();
        if series.len() < w + 1 {
            return obs;
        }
        for i in (w - 1)..(series.len() - 1) {
            let window = &series[i + 1 - w..=i];
            let high = window.iter().cloned().fold(f64::MIN, f64::max);
            if high <= 0.0 || series[i] <= 0.0 {
                continue;
            }
            let down = (high - series[i]) / high;
            let next_return = (series[i + 1] - series[i]) / series[i];
            obs.push((down, next_return));
        }
        obs
    }
}

impl ThresholdEstimator for DrawdownEstimator {
    fn estimate(&self, series: &[f64]) -> Result<TickerStats, DipscanError> {
        let obs = self.observations(series);
        if obs.len() < self.min_samples {
            return Err(DipscanError::Estimator(format!(
                "series too short: {} observations, need {}",
                obs.len(),
                self.min_samples
            )));
        }

        let max_down = obs
            .iter()
            .map(|(d, _)| *d)
            .fold(0.0_f64, f64::max);
        if max_down <= 0.0 {
            return Err(DipscanError::Estimator(
                "no drawdowns in look-back window".to_string(),
            ));
        }

        // Scan thresholds from 0 toward the deepest dip; at each level,
        // average the next-day return over historical breaches. Ties go
        // to the higher (more selective) threshold.
        let mut best: Option<TickerStats> = None;
        for step in 0..CANDIDATE_STEPS {
            let threshold = max_down * step as f64 / CANDIDATE_STEPS as f64;
            let returns: Vec<f64> = obs
                .iter()
                .filter(|(d, _)| *d > threshold)
                .map(|(_, r)| *r)
                .collect();
            if returns.len() < self.min_samples {
                break;
            }
            let avg_return = returns.iter().sum::<f64>() / returns.len() as f64;
            let better = match &best {
                None => true,
                Some(b) => avg_return.partial_cmp(&b.avg_return) != Some(Ordering::Less),
            };
            if better {
                best = Some(TickerStats {
                    avg_return,
                    threshold,
                });
            }
        }

        best.ok_or_else(|| {
            DipscanError::Estimator(format!(
                "fewer than {} breaches at any threshold",
                self.min_samples
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat at `base` with a dip to `base * (1 - depth)` every `period`
    /// days, recovering the following day.
    fn dipping_series(days: usize, base: f64, depth: f64, period: usize) -> Vec<f64> {
        (0..days)
            .map(|i| {
                if i % period == period - 1 {
                    base * (1.0 - depth)
                } else {
                    base
                }
            })
            .collect()
    }

    #[test]
    fn test_rebounding_dips_give_positive_stats() {
        let series = dipping_series(200, 100.0, 0.10, 10);
        let estimator = DrawdownEstimator::new(10, 5);
        let stats = estimator.estimate(&series).unwrap();

        // Every 10% dip recovered fully the next day (+11.1%).
        assert!(stats.threshold > 0.0, "threshold {}", stats.threshold);
        assert!(stats.avg_return > 0.10, "avg_return {}", stats.avg_return);
    }

    #[test]
    fn test_tie_break_prefers_selective_threshold() {
        // All breaches share the same rebound, so every candidate level
        // ties on avg_return; the estimator must keep the deepest one.
        let series = dipping_series(200, 100.0, 0.10, 10);
        let estimator = DrawdownEstimator::new(10, 5);
        let stats = estimator.estimate(&series).unwrap();
        assert!(stats.threshold > 0.05, "threshold {}", stats.threshold);
    }

    #[test]
    fn test_monotone_series_is_an_error() {
        let series: Vec<f64> = (1..200).map(|i| i as f64).collect();
        let estimator = DrawdownEstimator::new(10, 5);
        assert!(estimator.estimate(&series).is_err());
    }

    #[test]
    fn test_short_series_is_an_error() {
        let series = vec![100.0; 8];
        let estimator = DrawdownEstimator::new(10, 5);
        assert!(estimator.estimate(&series).is_err());
    }

    #[test]
    fn test_deterministic() {
        let series = dipping_series(300, 50.0, 0.08, 7);
        let estimator = DrawdownEstimator::new(10, 5);
        let a = estimator.estimate(&series).unwrap();
        let b = estimator.estimate(&series).unwrap();
        assert_eq!(a, b);
    }
}
