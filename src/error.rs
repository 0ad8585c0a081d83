use thiserror::Error;

use crate::domain::reservation::token::TokenId;
use crate::domain::task::task::{TaskId, TaskStatus};
use crate::domain::time::SimTime;

/// The two independent resources a solver accounts for in its capacity ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerResource {
    /// Compute throughput (instructions per processing iteration).
    Compute,
    /// Radio resource blocks.
    ResourceBlocks,
}

impl std::fmt::Display for LedgerResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerResource::Compute => write!(f, "compute"),
            LedgerResource::ResourceBlocks => write!(f, "resource blocks"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse simulation configuration JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to read or write CSV data: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid simulation configuration: {0}")]
    ConfigurationError(String),

    /// The solver can never serve the request, whatever the time window.
    #[error("Solver {solver} cannot provide {required} ips, its nominal capacity is {nominal} ips")]
    InsufficientNominalCapacity { solver: String, required: f64, nominal: f64 },

    /// The request does not fit into the free capacity of the requested window right now.
    #[error("Not enough free {resource} capacity between {from} and {to}")]
    InsufficientWindowCapacity { resource: LedgerResource, from: SimTime, to: SimTime },

    #[error("Task {task} arrived at {arrival}, outside of its reservation window [{valid_from}, {valid_to}]")]
    ReservationWindowViolation { task: TaskId, arrival: SimTime, valid_from: SimTime, valid_to: SimTime },

    #[error("No feasible solver found for task {0}")]
    NoFeasibleSolver(TaskId),

    /// An already validated reservation failed to commit. Always a bug in the ledger bookkeeping.
    #[error("Capacity ledger consistency fault: {0}")]
    LedgerConsistencyFault(String),

    #[error("Reservation token {0} is already signed")]
    TokenAlreadySigned(TokenId),

    #[error("Reservation token {0} is not part of the solver's token collection")]
    UnknownToken(TokenId),

    #[error("Reservation token {token} belongs to solver {expected}, not to solver {actual}")]
    TokenSolverMismatch { token: TokenId, expected: String, actual: String },

    #[error("Task {task} cannot move from {from:?} to {to:?}")]
    InvalidTaskTransition { task: TaskId, from: Option<TaskStatus>, to: TaskStatus },

    #[error("Unknown solver: {0}")]
    UnknownSolver(String),

    #[error("Unknown vehicle: {0}")]
    UnknownVehicle(String),
}

impl Error {
    /// Whether the error must abort the simulation run instead of being reported as a task status.
    ///
    /// A reservation window violation is a configuration or logic error; it aborts debug builds
    /// and is only logged (and the task failed) in release builds.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::LedgerConsistencyFault(_) | Error::InvalidTaskTransition { .. } => true,
            Error::ReservationWindowViolation { .. } => cfg!(debug_assertions),
            Error::IoError(_) | Error::DeserializationError(_) | Error::CsvError(_) | Error::ConfigurationError(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
