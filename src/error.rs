use crate::master::{ConsId, VarId};
use crate::retcode::Retcode;
use crate::status::Status;
use thiserror::Error;

/// Errors raised by the column generation core and its master adapters.
///
/// Non-convergence and an empty pricing result are regular outcomes and never show up here.
#[derive(Debug, Error)]
pub enum Error {
    /// The input handed to a boundary call is malformed (length mismatch, empty list, bad bound...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A pricer received a dual vector whose length does not match its item count.
    #[error("dual vector has {found} entries but the pricer knows {expected} items")]
    DualLengthMismatch {
        /// Number of items known to the pricer.
        expected: usize,
        /// Length of the dual vector that was passed in.
        found: usize,
    },

    /// The variable handle does not belong to this master problem.
    #[error("unknown variable {0:?}")]
    UnknownVariable(VarId),

    /// The constraint handle does not belong to this master problem.
    #[error("unknown constraint {0:?}")]
    UnknownConstraint(ConsId),

    /// The external solver returned a non-okay return code.
    #[error("solver call failed with {0:?}")]
    Scip(Retcode),

    /// The master problem finished with a status other than optimal.
    #[error("master problem was not solved to optimality (status {0:?})")]
    MasterNotSolved(Status),

    /// A solution value was requested while no solution is available.
    #[error("no solution available, solve the master problem first")]
    NoSolution,

    /// The problem description could not be decoded.
    #[error("malformed problem description: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<Retcode> for Error {
    fn from(retcode: Retcode) -> Self {
        Error::Scip(retcode)
    }
}

/// Shorthand for results carrying the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
