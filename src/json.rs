//! Instance and solution files in JSON.

use crate::data::{Instance, Op, OperationTime, Schedule, Time};
use crate::error::{Error, ValidationError};
use crate::solver::{Outcome, Statistics};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceFile {
  #[serde(default = "default_name")]
  pub name: String,
  pub n_machines: usize,
  pub n_jobs: usize,
  #[serde(default)]
  pub bks: Option<u32>,
  pub jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
  pub id: usize,
  pub operations: Vec<OperationEntry>,
}

/// Kept signed so that negative values reach validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationEntry {
  pub machine: i64,
  pub duration: i64,
}

fn default_name() -> String {
  "unnamed".to_string()
}

impl InstanceFile {
  pub fn from_instance(inst: &Instance) -> Self {
    let jobs = inst
      .jobs()
      .iter()
      .enumerate()
      .map(|(j, job)| JobEntry {
        id: j,
        operations: job
          .operations()
          .iter()
          .map(|op| OperationEntry {
            machine: op.machine as i64,
            duration: op.duration as i64,
          })
          .collect(),
      })
      .collect();

    InstanceFile {
      name: inst.name().to_string(),
      n_machines: inst.n_machines(),
      n_jobs: inst.n_jobs(),
      bks: inst.bks(),
      jobs: jobs,
    }
  }

  pub fn into_instance(self) -> Result<Instance, ValidationError> {
    let mut raw_jobs = Vec::with_capacity(self.jobs.len());
    for (position, job) in self.jobs.into_iter().enumerate() {
      if job.id != position {
        return Err(ValidationError::JobIdMismatch {
          position: position,
          id: job.id,
        });
      }
      raw_jobs.push(
        job
          .operations
          .into_iter()
          .map(|op| (op.machine, op.duration))
          .collect(),
      );
    }

    return Instance::new(self.name, self.n_jobs, self.n_machines, raw_jobs, self.bks);
  }
}

pub fn parse_instance(contents: &str) -> Result<Instance, Error> {
  let file: InstanceFile = serde_json::from_str(contents)?;
  return Ok(file.into_instance()?);
}

pub fn instance_to_string(inst: &Instance) -> Result<String, Error> {
  return Ok(serde_json::to_string_pretty(&InstanceFile::from_instance(inst))?);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionFile {
  pub instance: String,
  pub makespan: Time,
  pub lower_bound: Time,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gap_percent: Option<f64>,
  pub schedule: Vec<JobTimes>,
  /// `[job, operation index]` pairs in processing order, per machine.
  pub machine_orders: Vec<Vec<Op>>,
  pub statistics: Statistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTimes {
  pub id: usize,
  pub operations: Vec<OperationTimeEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationTimeEntry {
  pub start: Time,
  pub end: Time,
  pub machine: usize,
}

impl From<&OperationTime> for OperationTimeEntry {
  fn from(t: &OperationTime) -> Self {
    OperationTimeEntry {
      start: t.start,
      end: t.end,
      machine: t.machine,
    }
  }
}

impl SolutionFile {
  pub fn new(inst: &Instance, outcome: &Outcome) -> Self {
    let schedule = &outcome.schedule;
    let times = schedule
      .times()
      .iter()
      .enumerate()
      .map(|(j, job)| JobTimes {
        id: j,
        operations: job.iter().map(OperationTimeEntry::from).collect(),
      })
      .collect();

    SolutionFile {
      instance: inst.name().to_string(),
      makespan: schedule.makespan(),
      lower_bound: inst.lower_bound(),
      gap_percent: inst.gap_percent(schedule.makespan()),
      schedule: times,
      machine_orders: schedule.candidate().to_ops(inst),
      statistics: outcome.statistics.clone(),
    }
  }

  /// Rebuilds the schedule, checking it against `inst`.
  pub fn to_schedule(&self, inst: &Instance) -> Result<Schedule, Error> {
    let start_times: Vec<Vec<Time>> = self
      .schedule
      .iter()
      .map(|job| job.operations.iter().map(|t| t.start).collect())
      .collect();
    let schedule = Schedule::from_start_times(inst, &start_times)?;

    for (job, entries) in schedule.times().iter().zip(&self.schedule) {
      for (o, (actual, entry)) in job.iter().zip(&entries.operations).enumerate() {
        if OperationTimeEntry::from(actual) != *entry {
          return Err(Error::SolutionMismatch {
            op: [entries.id, o],
            message: format!("expected {:?}, file has {:?}", actual, entry),
          });
        }
      }
    }
    if schedule.makespan() != self.makespan {
      return Err(Error::SolutionMismatch {
        op: [0, 0],
        message: format!(
          "makespan is {} but the file states {}",
          schedule.makespan(),
          self.makespan
        ),
      });
    }

    return Ok(schedule);
  }
}

pub fn solution_to_string(inst: &Instance, outcome: &Outcome) -> Result<String, Error> {
  return Ok(serde_json::to_string_pretty(&SolutionFile::new(inst, outcome))?);
}

pub fn parse_solution(contents: &str) -> Result<SolutionFile, Error> {
  return Ok(serde_json::from_str(contents)?);
}
