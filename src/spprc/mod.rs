//! Resource-constrained shortest path pricing.
//!
//! [`Graph`] describes the subproblem, [`SpprcPricer`] solves it by label setting: partial paths
//! are kept as [`Label`]s in a [`LabelArena`], and every node holds the Pareto front of its labels
//! in a [`LabelSet`], maintained with the [`dominates`] relation.

/// Dominance between labels and Pareto maintenance of label sets.
pub mod dominance;
/// Graphs, arcs and resource windows.
pub mod graph;
/// Labels and their arena.
pub mod label;
/// The label-setting pricer.
pub mod pricer;

pub use dominance::dominates;
pub use graph::{Arc, ArcId, Graph, NodeId, ResourceWindow};
pub use label::{Label, LabelArena, LabelId, LabelSet};
pub use pricer::{ShortestPath, SpprcPricer};
