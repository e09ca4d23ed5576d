use crate::column::{reduced_cost, DualVector, Pattern};
use crate::error::{Error, Result};

/// A trait for pricing oracles.
///
/// Given the duals of the covering constraints, a pricer returns the most promising column it knows
/// about together with its reduced cost. The generation loop only talks to this trait, so the
/// knapsack and the resource-constrained shortest path oracle are interchangeable.
pub trait Pricer {
    /// Number of items (covering constraints) the pricer works on.
    fn n_items(&self) -> usize;

    /// Solves the pricing problem.
    ///
    /// # Arguments
    /// * `duals`: one dual value per covering constraint, never modified.
    ///
    /// # Errors
    /// Returns [`Error::DualLengthMismatch`] if `duals` does not have [`Pricer::n_items`] entries.
    /// Finding no useful column is not an error; the pricer then returns the empty pattern.
    fn price(&mut self, duals: &DualVector) -> Result<PricingResult>;
}

impl<P: Pricer + ?Sized> Pricer for Box<P> {
    fn n_items(&self) -> usize {
        (**self).n_items()
    }

    fn price(&mut self, duals: &DualVector) -> Result<PricingResult> {
        (**self).price(duals)
    }
}

/// Candidate column produced by a [`Pricer`].
#[derive(Debug, Clone, PartialEq)]
pub struct PricingResult {
    /// How often each item is cut.
    pub pattern: Pattern,
    /// Objective coefficient the column gets in the master.
    pub objective_coefficient: f64,
    /// `objective_coefficient − Σ duals[i] * pattern[i]`.
    pub reduced_cost: f64,
}

impl PricingResult {
    /// Creates a result, computing the reduced cost from the pattern.
    pub fn new(pattern: Pattern, objective_coefficient: f64, duals: &DualVector) -> Self {
        let reduced_cost = reduced_cost(objective_coefficient, duals, &pattern);
        PricingResult {
            pattern,
            objective_coefficient,
            reduced_cost,
        }
    }

    /// Returns true if adding the column decreases the master objective by more than `tolerance`.
    pub fn is_improving(&self, tolerance: f64) -> bool {
        self.reduced_cost < -tolerance
    }

    /// Returns true if the column cuts off the infeasibility proof given by Farkas multipliers,
    /// i.e. `Σ farkas[i] * pattern[i] > tolerance`. The objective plays no role then.
    pub fn repairs_infeasibility(&self, farkas: &DualVector, tolerance: f64) -> bool {
        self.pattern.dual_value(farkas) > tolerance
    }
}

/// Checks the dual vector length against the pricer's item count.
pub(crate) fn check_duals(expected: usize, duals: &DualVector) -> Result<()> {
    if duals.len() != expected {
        return Err(Error::DualLengthMismatch {
            expected,
            found: duals.len(),
        });
    }
    Ok(())
}
