use crate::error::{Error, Result};
use crate::master::{MasterProblem, RestrictedMaster};
use crate::pricer::Pricer;
use serde::{Deserialize, Serialize};

/// Settings of the column generation loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// A column is added only if its reduced cost is below `-tolerance`.
    pub tolerance: f64,
    /// Maximum number of pricing rounds.
    pub max_iterations: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

impl GenerationConfig {
    /// Sets the reduced cost tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Decodes a configuration from JSON, missing fields keep their default.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::InvalidInput(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Result of a column generation run.
///
/// Running out of iterations is reported through `converged`, the objective is then still the
/// value of a feasible master.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// True if pricing found no improving column.
    pub converged: bool,
    /// Number of pricing rounds performed.
    pub iterations: usize,
    /// Objective of the last master solve.
    pub objective: f64,
    /// Number of columns added to the master.
    pub columns_added: usize,
    /// Objective of every master solve, in order.
    pub objective_history: Vec<f64>,
}

/// Drives a restricted master and a pricer until no improving column is left.
#[derive(Debug, Clone, Default)]
pub struct ColumnGenerator {
    config: GenerationConfig,
}

impl ColumnGenerator {
    /// Creates a generator with the given settings.
    pub fn new(config: GenerationConfig) -> Self {
        ColumnGenerator { config }
    }

    /// Returns the settings.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Runs column generation.
    ///
    /// Every iteration solves the master, hands its covering duals to `pricer` and adds the
    /// returned column if its reduced cost is below `-tolerance`. The loop stops in the first
    /// iteration where that is not the case, or after `max_iterations` iterations; in the latter
    /// case the master is solved once more so that it reflects every added column.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if the tolerance is invalid, the pricer and the master do not
    ///   agree on the number of items, or the master already went through
    ///   [`RestrictedMaster::solve_integer_restriction`].
    /// - [`Error::MasterNotSolved`] if a master solve does not end optimally.
    /// - Any error of the master adapter or the pricer.
    pub fn generate<M, P>(&self, master: &mut RestrictedMaster<M>, pricer: &mut P) -> Result<Outcome>
    where
        M: MasterProblem,
        P: Pricer + ?Sized,
    {
        self.config.validate()?;
        if master.is_integral() {
            return Err(Error::InvalidInput(
                "the master columns are integer, its duals cannot be priced".to_string(),
            ));
        }
        if pricer.n_items() != master.n_items() {
            return Err(Error::InvalidInput(format!(
                "pricer knows {} items, master has {} covering constraints",
                pricer.n_items(),
                master.n_items()
            )));
        }

        log::info!(
            "column generation on {} items, {} initial columns (tolerance {}, at most {} iterations)",
            master.n_items(),
            master.columns().len(),
            self.config.tolerance,
            self.config.max_iterations
        );

        let mut history = Vec::new();
        let mut columns_added = 0;
        for iteration in 1..=self.config.max_iterations {
            let objective = solve_master(master)?;
            history.push(objective);

            let duals = master.duals()?;
            let result = pricer.price(&duals)?;
            log::debug!(
                "iteration {iteration}: objective {objective:.6}, best column {} with reduced cost {:.6}",
                result.pattern,
                result.reduced_cost
            );

            if !result.is_improving(self.config.tolerance) {
                log::info!(
                    "converged after {iteration} iterations with objective {objective:.6}, {columns_added} columns added"
                );
                return Ok(Outcome {
                    converged: true,
                    iterations: iteration,
                    objective,
                    columns_added,
                    objective_history: history,
                });
            }

            master.add_column(result.pattern, result.objective_coefficient)?;
            columns_added += 1;
        }

        let objective = solve_master(master)?;
        history.push(objective);
        log::warn!(
            "no convergence within {} iterations, objective {objective:.6}",
            self.config.max_iterations
        );
        Ok(Outcome {
            converged: false,
            iterations: self.config.max_iterations,
            objective,
            columns_added,
            objective_history: history,
        })
    }
}

fn solve_master<M: MasterProblem>(master: &mut RestrictedMaster<M>) -> Result<f64> {
    let status = master.solve()?;
    if !status.is_optimal() {
        return Err(Error::MasterNotSolved(status));
    }
    master.objective()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::CuttingStockInstance;
    use crate::knapsack::KnapsackPricer;
    use crate::master::scripted::{ScriptedMaster, Step};
    use crate::status::Status;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn instance() -> CuttingStockInstance {
        CuttingStockInstance::from_reader(
            std::fs::File::open("data/test/cutting_stock.json").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = GenerationConfig::default();
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.max_iterations, 100);

        let config = GenerationConfig::from_json_str(r#"{"max_iterations": 7}"#).unwrap();
        assert_eq!(config, GenerationConfig::default().with_max_iterations(7));
        assert!(GenerationConfig::from_json_str(r#"{"tol": 1.0}"#).is_err());
    }

    #[test]
    fn stops_on_the_first_non_improving_round() {
        init_logger();
        let steps = vec![
            Step::optimal(90.0, vec![1.0, 1.0, 1.0]),
            Step::optimal(48.0, vec![0.2, 0.35, 0.5]),
        ];
        let mut master = RestrictedMaster::cutting_stock(ScriptedMaster::new(steps), &instance())
            .unwrap();
        let mut pricer = KnapsackPricer::for_instance(&instance());

        let outcome = ColumnGenerator::default()
            .generate(&mut master, &mut pricer)
            .unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.columns_added, 1);
        assert_eq!(outcome.objective, 48.0);
        assert_eq!(outcome.objective_history, vec![90.0, 48.0]);
        assert_eq!(master.master().solves, 2);

        // all duals equal to 1: five pieces of width 20 fill the roll
        let added = master.columns().last().unwrap();
        assert_eq!(added.pattern.counts(), &[5, 0, 0]);
        assert_eq!(added.cost, 1.0);
    }

    #[test]
    fn reports_exhausted_budget() {
        let steps = vec![
            Step::optimal(90.0, vec![1.0, 1.0, 1.0]),
            Step::optimal(80.0, vec![1.0, 1.0, 1.0]),
            Step::optimal(70.0, vec![1.0, 1.0, 1.0]),
            Step::optimal(60.0, vec![1.0, 1.0, 1.0]),
        ];
        let mut master = RestrictedMaster::cutting_stock(ScriptedMaster::new(steps), &instance())
            .unwrap();
        let mut pricer = KnapsackPricer::for_instance(&instance());

        let config = GenerationConfig::default().with_max_iterations(3);
        let outcome = ColumnGenerator::new(config)
            .generate(&mut master, &mut pricer)
            .unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.columns_added, 3);
        assert_eq!(outcome.objective, 60.0);
        assert_eq!(outcome.objective_history, vec![90.0, 80.0, 70.0, 60.0]);
        assert_eq!(master.master().solves, 4);
        assert_eq!(master.columns().len(), 6);
    }

    #[test]
    fn zero_budget_still_solves_once() {
        let steps = vec![Step::optimal(90.0, vec![1.0, 1.0, 1.0])];
        let mut master = RestrictedMaster::cutting_stock(ScriptedMaster::new(steps), &instance())
            .unwrap();
        let mut pricer = KnapsackPricer::for_instance(&instance());

        let config = GenerationConfig::default().with_max_iterations(0);
        let outcome = ColumnGenerator::new(config)
            .generate(&mut master, &mut pricer)
            .unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.objective, 90.0);
        assert_eq!(outcome.columns_added, 0);
    }

    #[test]
    fn failed_master_solve_is_an_error() {
        let steps = vec![Step::with_status(Status::Infeasible)];
        let mut master = RestrictedMaster::cutting_stock(ScriptedMaster::new(steps), &instance())
            .unwrap();
        let mut pricer = KnapsackPricer::for_instance(&instance());
        assert!(matches!(
            ColumnGenerator::default().generate(&mut master, &mut pricer),
            Err(Error::MasterNotSolved(Status::Infeasible))
        ));
    }

    #[test]
    fn rejects_mismatched_pricer_and_bad_tolerance() {
        let steps = vec![Step::optimal(90.0, vec![1.0, 1.0, 1.0])];
        let mut master = RestrictedMaster::cutting_stock(ScriptedMaster::new(steps), &instance())
            .unwrap();

        let mut pricer = KnapsackPricer::new(vec![20, 35], 100).unwrap();
        assert!(matches!(
            ColumnGenerator::default().generate(&mut master, &mut pricer),
            Err(Error::InvalidInput(_))
        ));

        let mut pricer = KnapsackPricer::for_instance(&instance());
        let config = GenerationConfig::default().with_tolerance(-1.0);
        assert!(matches!(
            ColumnGenerator::new(config).generate(&mut master, &mut pricer),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(master.master().solves, 0);
    }

    #[test]
    fn integer_master_is_not_priced_again() {
        let steps = vec![
            Step::optimal(48.0, vec![0.2, 0.35, 0.5]),
            Step::optimal(50.0, vec![]),
        ];
        let mut master = RestrictedMaster::cutting_stock(ScriptedMaster::new(steps), &instance())
            .unwrap();
        let mut pricer = KnapsackPricer::for_instance(&instance());
        ColumnGenerator::default()
            .generate(&mut master, &mut pricer)
            .unwrap();
        master.solve_integer_restriction().unwrap();
        let solves = master.master().solves;

        assert!(matches!(
            ColumnGenerator::default().generate(&mut master, &mut pricer),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(master.master().solves, solves);
    }

    #[test]
    fn columns_only_grow_and_objective_never_rises() {
        init_logger();
        let steps = vec![
            Step::optimal(90.0, vec![1.0, 1.0, 1.0]),
            Step::optimal(60.0, vec![0.5, 1.0, 1.0]),
            Step::optimal(45.0, vec![0.2, 0.5, 1.0]),
            Step::optimal(40.0, vec![0.2, 0.35, 0.5]),
        ];
        let mut master = RestrictedMaster::cutting_stock(ScriptedMaster::new(steps), &instance())
            .unwrap();
        let mut pricer = KnapsackPricer::for_instance(&instance());

        // two short runs on the same master, the second continues where the first stopped
        let config = GenerationConfig::default().with_max_iterations(1);
        let first = ColumnGenerator::new(config)
            .generate(&mut master, &mut pricer)
            .unwrap();
        let vars_after_first = master.master().vars.clone();
        let columns_after_first = master.columns().to_vec();
        assert_eq!(vars_after_first.len(), 3 + first.columns_added);

        let second = ColumnGenerator::default()
            .generate(&mut master, &mut pricer)
            .unwrap();
        assert!(second.converged);

        let vars = &master.master().vars;
        assert_eq!(vars.len(), vars_after_first.len() + second.columns_added);
        assert_eq!(&vars[..vars_after_first.len()], &vars_after_first[..]);
        assert_eq!(&master.columns()[..columns_after_first.len()], &columns_after_first[..]);

        let history: Vec<f64> = first
            .objective_history
            .iter()
            .chain(&second.objective_history)
            .copied()
            .collect();
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn short_dual_vector_reaches_the_pricer() {
        let steps = vec![Step::optimal(90.0, vec![1.0, 1.0, 1.0])];
        let mut master = RestrictedMaster::new(ScriptedMaster::new(steps), &[1.0, 1.0, 1.0])
            .unwrap();
        // a pricer that claims three items but was built for two widths
        struct Liar(KnapsackPricer);
        impl Pricer for Liar {
            fn n_items(&self) -> usize {
                3
            }
            fn price(
                &mut self,
                duals: &crate::column::DualVector,
            ) -> Result<crate::pricer::PricingResult> {
                self.0.price(duals)
            }
        }
        let mut pricer = Liar(KnapsackPricer::new(vec![20, 35], 100).unwrap());
        assert!(matches!(
            ColumnGenerator::default().generate(&mut master, &mut pricer),
            Err(Error::DualLengthMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[cfg(feature = "scip")]
    mod scip {
        use super::*;
        use crate::scip::ScipMaster;
        use crate::spprc::SpprcPricer;

        fn run(pricer: &mut dyn Pricer) -> (Outcome, RestrictedMaster<ScipMaster>) {
            init_logger();
            let instance = instance();
            let mut master =
                RestrictedMaster::cutting_stock(ScipMaster::new("cutting_stock").unwrap(), &instance)
                    .unwrap();
            let outcome = ColumnGenerator::default()
                .generate(&mut master, pricer)
                .unwrap();
            (outcome, master)
        }

        #[test]
        fn knapsack_pricing_converges() {
            let instance = instance();
            let (outcome, master) = run(&mut KnapsackPricer::for_instance(&instance));

            assert!(outcome.converged);
            assert!(outcome.objective >= instance.material_lower_bound() - 1e-6);
            assert!(outcome.objective < 90.0);
            for pair in outcome.objective_history.windows(2) {
                assert!(pair[1] <= pair[0] + 1e-6);
            }
            assert_eq!(master.columns().len(), 3 + outcome.columns_added);

            // primal feasibility of the final master
            let x = master.solution().unwrap();
            for (i, item) in instance.items().iter().enumerate() {
                let covered: f64 = master
                    .columns()
                    .iter()
                    .zip(&x)
                    .map(|(col, v)| col.pattern.count(i) as f64 * v)
                    .sum();
                assert!(covered >= item.demand as f64 - 1e-5);
            }
        }

        #[test]
        fn both_oracles_reach_the_same_bound() {
            let instance = instance();
            let (knapsack, _) = run(&mut KnapsackPricer::for_instance(&instance));
            let (spprc, _) = run(&mut SpprcPricer::for_instance(&instance));
            assert!(spprc.converged);
            assert!((knapsack.objective - spprc.objective).abs() < 1e-6);
        }

        #[test]
        fn integer_restriction_bounds_the_lp() {
            let instance = instance();
            let (outcome, mut master) = run(&mut KnapsackPricer::for_instance(&instance));
            let integer = master.solve_integer_restriction().unwrap();
            assert!(integer >= outcome.objective - 1e-6);
            assert!((integer - integer.round()).abs() < 1e-6);
        }
    }
}
