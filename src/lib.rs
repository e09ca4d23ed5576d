//! # colgen
//!
//! Column generation for covering problems such as cutting stock.
//!
//! A [`RestrictedMaster`] wraps an LP engine implementing [`MasterProblem`] (SCIP through
//! [`ScipMaster`] when the `scip` feature is on). [`ColumnGenerator`] alternates between solving
//! it and asking a [`Pricer`] for a column with negative reduced cost. Two pricers ship with the
//! crate: [`KnapsackPricer`], an unbounded knapsack dynamic program for the single-resource case,
//! and [`SpprcPricer`], a label-setting resource-constrained shortest path solver with dominance
//! pruning.
//!
#![cfg_attr(feature = "scip", doc = "```no_run")]
#![cfg_attr(not(feature = "scip"), doc = "```ignore")]
//! use colgen::prelude::*;
//!
//! let instance = CuttingStockInstance::new(&[20, 35, 50], &[40, 30, 20], 100).unwrap();
//! let master = ScipMaster::new("cutting_stock").unwrap();
//! let mut rmp = RestrictedMaster::cutting_stock(master, &instance).unwrap();
//! let mut pricer = KnapsackPricer::for_instance(&instance);
//!
//! let outcome = ColumnGenerator::default().generate(&mut rmp, &mut pricer).unwrap();
//! assert!(outcome.converged);
//! println!("LP bound: {}", outcome.objective);
//! ```

#![deny(missing_docs)]

#[cfg(feature = "scip")]
pub(crate) use scip_sys as ffi;

/// Column generation loop.
pub mod colgen;
pub use colgen::*;

/// Patterns, dual vectors and reduced costs.
pub mod column;
pub use column::*;

/// Crate errors.
pub mod error;
pub use error::*;

/// Cutting-stock input data.
pub mod instance;
pub use instance::*;

/// Unbounded knapsack pricing.
pub mod knapsack;
pub use knapsack::*;

/// Master problem abstraction and the restricted master.
pub mod master;
pub use master::*;

/// The pricer interface.
pub mod pricer;
pub use pricer::*;

/// SCIP return codes.
pub mod retcode;
pub use retcode::Retcode;

/// SCIP-backed master problem.
#[cfg(feature = "scip")]
pub mod scip;
#[cfg(feature = "scip")]
pub use scip::ScipMaster;

pub mod spprc;
pub use spprc::SpprcPricer;

/// Status of a master solve.
pub mod status;
pub use status::*;

/// Imports the types needed to set up and run column generation.
pub mod prelude {
    pub use crate::colgen::{ColumnGenerator, GenerationConfig, Outcome};
    pub use crate::column::{DualVector, Pattern};
    pub use crate::instance::CuttingStockInstance;
    pub use crate::knapsack::KnapsackPricer;
    pub use crate::master::{MasterProblem, RestrictedMaster, VarType};
    pub use crate::pricer::{Pricer, PricingResult};
    #[cfg(feature = "scip")]
    pub use crate::scip::ScipMaster;
    pub use crate::spprc::{Graph, SpprcPricer};
    pub use crate::status::Status;
}
