//! Hand-off of instances to an external exact (constraint programming) solver.
//!
//! The instance is exported as a [`CpModel`]: one interval per operation,
//! precedence pairs along every job and one no-overlap group per machine. A
//! backend returns start times which are checked like any other schedule.

use crate::data::{Instance, Machine, OpId, Schedule, Time};
use crate::error::Error;
use crate::solver::{self, Outcome};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
  pub job: usize,
  pub index: usize,
  pub machine: Machine,
  pub duration: Time,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpModel {
  pub name: String,
  /// Sum of all durations, no schedule that matters ends later.
  pub horizon: Time,
  /// Indexed by operation id.
  pub intervals: Vec<Interval>,
  /// `(before, after)` interval pairs.
  pub precedences: Vec<(OpId, OpId)>,
  /// Interval ids per machine.
  pub no_overlap: Vec<Vec<OpId>>,
}

impl CpModel {
  pub fn from_instance(inst: &Instance) -> Self {
    let intervals = inst
      .op_ids()
      .map(|id| {
        let [job, index] = inst.op_from_id(id);
        Interval {
          job: job,
          index: index,
          machine: inst.machine(id),
          duration: inst.duration(id),
        }
      })
      .collect();
    let precedences = inst
      .op_ids()
      .filter_map(|id| inst.succ_job(id).map(|succ| (id, succ)))
      .collect();
    let no_overlap = (0..inst.n_machines())
      .map(|m| inst.machine_ops(m).to_vec())
      .collect();

    CpModel {
      name: inst.name().to_string(),
      horizon: inst.durations().sum(),
      intervals: intervals,
      precedences: precedences,
      no_overlap: no_overlap,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
  Optimal,
  /// A solution was found but optimality was not proven within the limit.
  Feasible,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSolution {
  pub status: Status,
  /// Indexed like [`CpModel::intervals`].
  pub start_times: Vec<Time>,
  pub branches: u64,
  pub conflicts: u64,
}

pub trait ExactBackend {
  type Error: Display;

  fn name(&self) -> &str;

  fn solve(
    &mut self,
    model: &CpModel,
    time_limit: Option<Duration>,
  ) -> Result<BackendSolution, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
  pub backend: String,
  pub status: Status,
  pub proven_optimal: bool,
  pub branches: u64,
  pub conflicts: u64,
  pub cpu_time: f64,
}

/// Solves `inst` with `backend` and checks the returned start times.
pub fn solve_with_backend<B: ExactBackend>(
  inst: &Instance,
  backend: &mut B,
  time_limit: Option<Duration>,
) -> Result<Outcome, Error> {
  let start = Instant::now();
  let model = CpModel::from_instance(inst);
  info!(
    "Handing {} intervals to backend {}",
    model.intervals.len(),
    backend.name()
  );

  let solution = backend
    .solve(&model, time_limit)
    .map_err(|err| Error::Backend(err.to_string()))?;
  if solution.start_times.len() != model.intervals.len() {
    return Err(Error::Backend(format!(
      "expected {} start times but got {}",
      model.intervals.len(),
      solution.start_times.len()
    )));
  }

  let start_times: Vec<Vec<Time>> = (0..inst.n_jobs())
    .map(|j| {
      (0..inst.job(j).n_operations())
        .map(|o| solution.start_times[inst.op_to_id([j, o])])
        .collect()
    })
    .collect();
  let schedule = Schedule::from_start_times(inst, &start_times)?;

  if solution.status != Status::Optimal {
    warn!("Backend did not prove optimality");
  }
  info!(
    "Backend {} returned makespan {} ({:?})",
    backend.name(),
    schedule.makespan(),
    solution.status
  );

  let stats = Statistics {
    backend: backend.name().to_string(),
    status: solution.status,
    proven_optimal: solution.status == Status::Optimal,
    branches: solution.branches,
    conflicts: solution.conflicts,
    cpu_time: start.elapsed().as_secs_f64(),
  };

  return Ok(Outcome {
    schedule: schedule,
    statistics: solver::Statistics::Exact(stats),
  });
}
