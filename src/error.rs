use crate::data::{Machine, Op};
use thiserror::Error;

/// Raised while building an [`Instance`](crate::data::Instance) from raw job data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("instance has no jobs")]
  NoJobs,
  #[error("instance has no machines")]
  NoMachines,
  #[error("expected {expected} jobs but found {found}")]
  JobCountMismatch { expected: usize, found: usize },
  #[error("job at position {position} has id {id}")]
  JobIdMismatch { position: usize, id: usize },
  #[error("job {job} has no operations")]
  EmptyJob { job: usize },
  #[error("operation {op:?} uses machine {machine} but the instance only has {n_machines} machines")]
  MachineOutOfRange {
    op: Op,
    machine: i64,
    n_machines: usize,
  },
  #[error("job {job} visits machine {machine} more than once")]
  DuplicateMachine { job: usize, machine: Machine },
  #[error("operation {op:?} has non-positive duration {duration}")]
  NonPositiveDuration { op: Op, duration: i64 },
  #[error("operation {op:?} has a duration that does not fit into 32 bits")]
  DurationTooLarge { op: Op },
  #[error("total duration {horizon} does not fit into 32 bits")]
  HorizonTooLarge { horizon: u64 },
}

/// A solution candidate that cannot be turned into a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InfeasibleOrderingError {
  #[error("orderings contain a cycle, {unscheduled} operations could not be scheduled")]
  Cycle { unscheduled: usize },
  #[error("expected orderings for {expected} machines but found {found}")]
  MachineCount { expected: usize, found: usize },
  #[error("operation {op:?} does not belong on machine {machine}")]
  ForeignOperation { op: Op, machine: Machine },
  #[error("operation {op:?} does not exist")]
  UnknownOperation { op: Op },
  #[error("operation id {id} is out of range")]
  UnknownOperationId { id: usize },
  #[error("operation {op:?} appears more than once")]
  DuplicateOperation { op: Op },
  #[error("{missing} operations are not assigned to any machine")]
  MissingOperations { missing: usize },
  #[error("operation {op:?} starting at {start} would end after the largest representable time")]
  TimeOverflow { op: Op, start: u32 },
  #[error("operation {op:?} starts at {start} before its job predecessor ends at {pre_end}")]
  Precedence { op: Op, start: u32, pre_end: u32 },
  #[error("operations {first:?} and {second:?} overlap on machine {machine}")]
  Overlap {
    first: Op,
    second: Op,
    machine: Machine,
  },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid value for `{field}`: {reason}")]
pub struct ConfigurationError {
  pub field: &'static str,
  pub reason: String,
}

impl ConfigurationError {
  pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
    ConfigurationError {
      field: field,
      reason: reason.into(),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),
  #[error(transparent)]
  Infeasible(#[from] InfeasibleOrderingError),
  #[error(transparent)]
  Configuration(#[from] ConfigurationError),
  #[error("line {line}: {message}")]
  Parse { line: usize, message: String },
  #[error("exact backend failed: {0}")]
  Backend(String),
  #[error("solution disagrees with the instance at {op:?}: {message}")]
  SolutionMismatch { op: Op, message: String },
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
