//! Fund allocation across buy candidates.
//!
//! Turns the ranked `(weight, ticker)` candidate list into per-ticker
//! fractions of the available fund. Fractions are non-negative and sum
//! to at most 1.

use std::collections::HashMap;
use tracing::debug;

/// Maps ranked buy candidates to fund fractions.
pub trait AllocationPolicy: Send + Sync {
    /// `candidates` arrive in ranking order as `(weight, ticker)` pairs.
    /// Returned fractions are non-negative and sum to <= 1; tickers may
    /// be omitted.
    fn allocate(&self, candidates: &[(f64, String)]) -> HashMap<String, f64>;
}

/// Weight-proportional allocation over the top-ranked candidates.
pub struct ProportionalAllocator {
    /// At most this many positions receive an allocation.
    pub max_positions: usize,
    /// Hard cap on any single position's fraction.
    pub max_fraction: f64,
}

impl ProportionalAllocator {
    pub fn new(max_positions: usize, max_fraction: f64) -> Self {
        Self {
            max_positions,
            max_fraction,
        }
    }
}

impl AllocationPolicy for ProportionalAllocator {
    fn allocate(&self, candidates: &[(f64, String)]) -> HashMap<String, f64> {
        let picked: Vec<&(f64, String)> = candidates
            .iter()
            .filter(|(weight, _)| *weight > 0.0)
            .take(self.max_positions)
            .collect();

        let total: f64 = picked.iter().map(|(weight, _)| weight).sum();
        if total <= 0.0 {
            return HashMap::new();
        }

        let fractions: HashMap<String, f64> = picked
            .into_iter()
            .map(|(weight, ticker)| {
                (ticker.clone(), (weight / total).min(self.max_fraction))
            })
            .collect();

        debug!(positions = fractions.len(), "Allocation computed");
        fractions
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(pairs: &[(f64, &str)]) -> Vec<(f64, String)> {
        pairs.iter().map(|(w, t)| (*w, t.to_string())).collect()
    }

    #[test]
    fn test_proportional_split() {
        let policy = ProportionalAllocator::new(5, 1.0);
        let fractions = policy.allocate(&candidates(&[(0.03, "AAA"), (0.01, "BBB")]));
        assert!((fractions["AAA"] - 0.75).abs() < 1e-10);
        assert!((fractions["BBB"] - 0.25).abs() < 1e-10);
    }

    #[test]
    fn test_fractions_sum_at_most_one() {
        let policy = ProportionalAllocator::new(10, 1.0);
        let fractions =
            policy.allocate(&candidates(&[(0.02, "AAA"), (0.02, "BBB"), (0.02, "CCC")]));
        let sum: f64 = fractions.values().sum();
        assert!(sum <= 1.0 + 1e-10, "sum {sum}");
        assert!(fractions.values().all(|f| *f >= 0.0));
    }

    #[test]
    fn test_max_fraction_cap() {
        let policy = ProportionalAllocator::new(5, 0.5);
        let fractions = policy.allocate(&candidates(&[(0.09, "AAA"), (0.01, "BBB")]));
        assert!((fractions["AAA"] - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_max_positions_keeps_ranking_order() {
        let policy = ProportionalAllocator::new(2, 1.0);
        let fractions = policy.allocate(&candidates(&[
            (0.01, "FIRST"),
            (0.05, "SECOND"),
            (0.09, "THIRD"),
        ]));
        // Candidates arrive in ranking order; the cut keeps the head.
        assert_eq!(fractions.len(), 2);
        assert!(fractions.contains_key("FIRST"));
        assert!(fractions.contains_key("SECOND"));
        assert!(!fractions.contains_key("THIRD"));
    }

    #[test]
    fn test_non_positive_weights_dropped() {
        let policy = ProportionalAllocator::new(5, 1.0);
        let fractions = policy.allocate(&candidates(&[(0.0, "ZERO"), (-0.02, "NEG")]));
        assert!(fractions.is_empty());
    }

    #[test]
    fn test_empty_candidates() {
        let policy = ProportionalAllocator::new(5, 1.0);
        assert!(policy.allocate(&[]).is_empty());
    }
}
