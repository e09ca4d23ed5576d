#[cfg(feature = "scip")]
use crate::ffi;

/// Outcome of the most recent master solve, as far as column generation cares about it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status {
    /// The master problem was solved to optimality, duals and primal values are available.
    Optimal,
    /// The master problem was proven to be infeasible.
    Infeasible,
    /// Anything else: not solved yet, interrupted by a limit, unbounded...
    Other,
}

impl Status {
    /// Returns true if duals and primal values can be read.
    pub fn is_optimal(self) -> bool {
        self == Status::Optimal
    }
}

#[cfg(feature = "scip")]
impl From<ffi::SCIP_Status> for Status {
    /// Collapses SCIP's solving status into the three cases the generation loop distinguishes.
    fn from(val: ffi::SCIP_Status) -> Self {
        match val {
            ffi::SCIP_Status_SCIP_STATUS_OPTIMAL => Status::Optimal,
            ffi::SCIP_Status_SCIP_STATUS_INFEASIBLE => Status::Infeasible,
            _ => Status::Other,
        }
    }
}
