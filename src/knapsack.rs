use crate::column::{DualVector, Pattern};
use crate::error::{Error, Result};
use crate::instance::CuttingStockInstance;
use crate::pricer::{check_duals, Pricer, PricingResult};

/// Pricing oracle for the single-resource case: an unbounded knapsack over the roll width.
///
/// Solves `max Σ duals[i] * z_i  s.t. Σ widths[i] * z_i <= capacity, z_i ∈ Z_{>=0}` by dynamic
/// programming over the widths `0..=capacity`. Items may be used any number of times.
#[derive(Debug, Clone)]
pub struct KnapsackPricer {
    widths: Vec<usize>,
    capacity: usize,
}

impl KnapsackPricer {
    /// Creates a pricer for the given item widths and roll capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an item has width zero, since any positive dual would
    /// then make its value unbounded.
    pub fn new(widths: Vec<usize>, capacity: usize) -> Result<Self> {
        if let Some(i) = widths.iter().position(|&w| w == 0) {
            return Err(Error::InvalidInput(format!("item {i} has width zero")));
        }
        Ok(KnapsackPricer { widths, capacity })
    }

    /// Creates the pricer matching a cutting-stock instance.
    pub fn for_instance(instance: &CuttingStockInstance) -> Self {
        KnapsackPricer {
            widths: instance.widths(),
            capacity: instance.capacity(),
        }
    }

    /// Returns the roll capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs the dynamic program and returns the best pattern with its dual value.
    ///
    /// The best value is taken over every width `w <= capacity`, not only `dp[capacity]`:
    /// an under-filled roll is optimal whenever no combination fills it exactly.
    /// Ties keep the first item index and the smallest width.
    pub fn solve(&self, duals: &DualVector) -> Result<(Pattern, f64)> {
        check_duals(self.widths.len(), duals)?;
        let duals = duals.as_slice();
        let cap = self.capacity;

        let mut dp = vec![0.0_f64; cap + 1];
        let mut choice: Vec<Option<usize>> = vec![None; cap + 1];

        // increasing w so that dp[w - width] may already contain the same item
        for w in 1..=cap {
            for (i, &width) in self.widths.iter().enumerate() {
                if width > w {
                    continue;
                }
                let candidate = dp[w - width] + duals[i];
                if candidate > dp[w] {
                    dp[w] = candidate;
                    choice[w] = Some(i);
                }
            }
        }

        let mut best_width = 0;
        for w in 1..=cap {
            if dp[w] > dp[best_width] {
                best_width = w;
            }
        }

        let mut pattern = Pattern::empty(self.widths.len());
        let mut w = best_width;
        while let Some(i) = choice[w] {
            pattern.add(i);
            w -= self.widths[i];
        }

        Ok((pattern, dp[best_width]))
    }
}

impl Pricer for KnapsackPricer {
    fn n_items(&self) -> usize {
        self.widths.len()
    }

    fn price(&mut self, duals: &DualVector) -> Result<PricingResult> {
        let (pattern, _) = self.solve(duals)?;
        Ok(PricingResult::new(pattern, 1.0, duals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rayon::prelude::*;

    fn random_duals(rng: &mut StdRng, n: usize) -> DualVector {
        DualVector::new((0..n).map(|_| rng.gen_range(-0.2..0.8)).collect())
    }

    #[test]
    fn zero_capacity_gives_empty_pattern() {
        let mut pricer = KnapsackPricer::new(vec![3, 5], 0).unwrap();
        let duals = DualVector::new(vec![1.0, 2.0]);
        let (pattern, value) = pricer.solve(&duals).unwrap();
        assert!(pattern.is_empty());
        assert_eq!(value, 0.0);

        let res = pricer.price(&duals).unwrap();
        assert_eq!(res.reduced_cost, 1.0);
    }

    #[test]
    fn rejects_zero_width() {
        assert!(matches!(
            KnapsackPricer::new(vec![20, 0, 50], 100),
            Err(Error::InvalidInput(_))
        ));
        assert!(KnapsackPricer::new(vec![], 100).is_ok());
    }

    #[test]
    fn single_item_is_repeated() {
        for (width, capacity) in [(7, 100), (20, 100), (50, 100), (100, 100), (3, 8)] {
            let mut pricer = KnapsackPricer::new(vec![width], capacity).unwrap();
            let res = pricer.price(&DualVector::new(vec![0.3])).unwrap();
            assert_eq!(res.pattern.counts(), &[capacity / width]);
        }
    }

    #[test]
    fn only_positive_dual_item_fills_the_roll() {
        let mut pricer = KnapsackPricer::new(vec![20, 35, 50], 100).unwrap();
        let res = pricer
            .price(&DualVector::new(vec![0.0, 0.4, -1.0]))
            .unwrap();
        assert_eq!(res.pattern.counts(), &[0, 2, 0]);
        assert!((res.reduced_cost - 0.2).abs() < 1e-12);
    }

    #[test]
    fn underfilled_roll_can_be_best() {
        // no combination of 6 and 7 fills 10 exactly
        let pricer = KnapsackPricer::new(vec![6, 7], 10).unwrap();
        let (pattern, value) = pricer.solve(&DualVector::new(vec![0.5, 0.8])).unwrap();
        assert_eq!(pattern.counts(), &[0, 1]);
        assert!((value - 0.8).abs() < 1e-12);
    }

    #[test]
    fn mixes_items() {
        let pricer = KnapsackPricer::new(vec![20, 35, 50], 100).unwrap();
        let (pattern, value) = pricer
            .solve(&DualVector::new(vec![0.25, 0.4, 0.5]))
            .unwrap();
        // 5x20 = 1.25 beats 3x20 + 1x35 = 1.15 and 2x20 + 1x50 = 1.0
        assert_eq!(pattern.counts(), &[5, 0, 0]);
        assert!((value - 1.25).abs() < 1e-12);
    }

    #[test]
    fn nonpositive_duals_give_empty_pattern() {
        let mut pricer = KnapsackPricer::new(vec![20, 35, 50], 100).unwrap();
        let res = pricer
            .price(&DualVector::new(vec![0.0, -0.5, 0.0]))
            .unwrap();
        assert!(res.pattern.is_empty());
        assert_eq!(res.reduced_cost, 1.0);
        assert!(!res.is_improving(1e-6));
    }

    #[test]
    fn wrong_dual_length() {
        let mut pricer = KnapsackPricer::new(vec![20, 35, 50], 100).unwrap();
        assert!(matches!(
            pricer.price(&DualVector::new(vec![1.0; 4])),
            Err(Error::DualLengthMismatch {
                expected: 3,
                found: 4
            })
        ));
    }

    #[test]
    fn reduced_cost_identity_holds() {
        let mut rng = StdRng::seed_from_u64(42);
        let widths = vec![20, 35, 50, 12, 41];
        let mut pricer = KnapsackPricer::new(widths.clone(), 100).unwrap();
        for _ in 0..200 {
            let duals = random_duals(&mut rng, widths.len());
            let res = pricer.price(&duals).unwrap();

            let value: f64 = res
                .pattern
                .counts()
                .iter()
                .zip(duals.as_slice())
                .map(|(&c, d)| c as f64 * d)
                .sum();
            assert_eq!(res.reduced_cost, 1.0 - value);
            assert!(res.pattern.total_width(&widths) <= 100);
        }
    }

    #[test]
    fn pattern_value_matches_dp_value() {
        let mut rng = StdRng::seed_from_u64(7);
        let pricer = KnapsackPricer::new(vec![3, 5, 8, 13], 40).unwrap();
        for _ in 0..100 {
            let duals = random_duals(&mut rng, 4);
            let (pattern, value) = pricer.solve(&duals).unwrap();
            assert!((pattern.dual_value(&duals) - value).abs() < 1e-9);
        }
    }

    #[test]
    fn beats_brute_force_never() {
        let widths = [4, 6, 9];
        let capacity = 25;
        let pricer = KnapsackPricer::new(widths.to_vec(), capacity).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let duals = random_duals(&mut rng, 3);
            let (_, value) = pricer.solve(&duals).unwrap();

            let mut best = 0.0_f64;
            for a in 0..=capacity / widths[0] {
                for b in 0..=capacity / widths[1] {
                    for c in 0..=capacity / widths[2] {
                        if a * widths[0] + b * widths[1] + c * widths[2] <= capacity {
                            let v = a as f64 * duals.as_slice()[0]
                                + b as f64 * duals.as_slice()[1]
                                + c as f64 * duals.as_slice()[2];
                            best = best.max(v);
                        }
                    }
                }
            }
            assert!((best - value).abs() < 1e-9);
        }
    }

    #[test]
    fn deterministic_across_threads() {
        let mut rng = StdRng::seed_from_u64(11);
        let inputs: Vec<DualVector> = (0..64).map(|_| random_duals(&mut rng, 3)).collect();
        let pricer = KnapsackPricer::new(vec![20, 35, 50], 100).unwrap();

        let sequential: Vec<_> = inputs.iter().map(|d| pricer.solve(d).unwrap()).collect();
        let parallel: Vec<_> = inputs
            .par_iter()
            .map(|d| pricer.clone().solve(d).unwrap())
            .collect();
        assert_eq!(sequential, parallel);
    }
}
