//! Error types for the planner.
//!
//! Infeasible neighbor candidates are not errors: operators simply return no
//! candidate. The types here cover what callers must actually handle.

use crate::instance::{TaskId, VehicleId};
use thiserror::Error;

/// Raised when some task cannot be carried by the vehicle an initial
/// construction policy wants to hand it to.
///
/// For first-fit construction this means the task is heavier than every
/// vehicle of the fleet, so the instance is unsolvable as stated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {task} (weight {weight}) cannot be carried: largest admissible capacity is {capacity}")]
pub struct InfeasibleFleetError {
    pub task: TaskId,
    pub weight: i32,
    pub capacity: i32,
}

/// Internal-consistency violation of a vehicle → agenda mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("expected one agenda per vehicle ({expected}), found {found}")]
    FleetMismatch { expected: usize, found: usize },

    #[error("task {0} is not part of the instance")]
    UnknownTask(TaskId),

    #[error("task {0} is not assigned to any vehicle")]
    MissingTask(TaskId),

    #[error("task {task} appears more than once (vehicle {vehicle})")]
    DuplicateTask { task: TaskId, vehicle: VehicleId },

    #[error("task {task} is picked up and delivered by different vehicles")]
    SplitTask { task: TaskId },

    #[error("task {task} is delivered before being picked up by vehicle {vehicle}")]
    DeliveryBeforePickup { task: TaskId, vehicle: VehicleId },
}

/// Errors raised while reading or validating a problem instance.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("cannot read instance: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON instance: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("{0}")]
    Invalid(String),

    #[error("city {from} cannot reach city {to} through the road network")]
    Disconnected { from: usize, to: usize },
}

impl InstanceError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        InstanceError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Configuration rejected by [`crate::heuristics::sls::SlsConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Top-level error used by the command line and the benchmark harness.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    InfeasibleFleet(#[from] InfeasibleFleetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot serialize output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot write CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = InfeasibleFleetError { task: 3, weight: 6, capacity: 5 };
        assert_eq!(
            err.to_string(),
            "task 3 (weight 6) cannot be carried: largest admissible capacity is 5"
        );

        let err = StructuralError::DeliveryBeforePickup { task: 1, vehicle: 0 };
        assert!(err.to_string().contains("delivered before"));
    }
}
