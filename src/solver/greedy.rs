use crate::data::{Duration, Instance, OpId, Schedule, SolutionCandidate, Time};
use crate::error::ConfigurationError;
use crate::solver::evaluator;
use log::{debug, info};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::{self, Reverse};
use std::str::FromStr;
use std::time::Instant;

/// Dispatch rule used to pick the next operation among the ready ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
  /// Smallest `max(job ready, machine free) + duration`, ties by job then machine.
  EarliestCompletion,
  /// Shortest duration, ties by earliest start then job.
  ShortestProcessingTime,
  /// Largest remaining work of the job, ties by job.
  MostWorkRemaining,
}

impl Default for Rule {
  fn default() -> Self {
    Rule::EarliestCompletion
  }
}

impl FromStr for Rule {
  type Err = ConfigurationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "ect" | "earliest-completion" => Ok(Rule::EarliestCompletion),
      "spt" | "shortest-processing-time" => Ok(Rule::ShortestProcessingTime),
      "mwr" | "most-work-remaining" => Ok(Rule::MostWorkRemaining),
      _ => Err(ConfigurationError::new(
        "rule",
        format!("unknown dispatch rule `{}`", s),
      )),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub rule: Rule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
  pub rule: Rule,
  pub cpu_time: f64,
  pub operations_scheduled: usize,
}

pub fn find_solution(inst: &Instance, config: &Config) -> (Schedule, Statistics) {
  let start = Instant::now();
  let candidate = find_candidate(inst, config.rule);

  // Constructed orders follow the dispatch sequence and are acyclic
  let schedule = match evaluator::evaluate(inst, &candidate) {
    Ok(schedule) => schedule,
    Err(err) => unreachable!("dispatching produced an infeasible ordering: {}", err),
  };

  info!(
    "Greedy ({:?}) finished with makespan {}",
    config.rule,
    schedule.makespan()
  );

  let stats = Statistics {
    rule: config.rule,
    cpu_time: start.elapsed().as_secs_f64(),
    operations_scheduled: inst.n_ops(),
  };

  return (schedule, stats);
}

/// Builds machine orders by repeatedly dispatching one of the ready operations.
pub fn find_candidate(inst: &Instance, rule: Rule) -> SolutionCandidate {
  let mut machine_orders = vec![Vec::new(); inst.n_machines()];
  let mut machine_next_release = Array1::<Time>::from_elem(inst.n_machines(), 0);
  let mut job_next_release = Array1::<Time>::from_elem(inst.n_jobs(), 0);
  let mut work_remaining: Array1<Duration> = (0..inst.n_jobs())
    .map(|j| inst.job_total_duration(j))
    .collect();

  let mut ready: Vec<OpId> = (0..inst.n_jobs()).map(|j| inst.op_to_id([j, 0])).collect();

  while !ready.is_empty() {
    let release_of = |op: OpId| {
      cmp::max(
        job_next_release[inst.job_of(op)],
        machine_next_release[inst.machine(op)],
      )
    };

    let chosen_idx = match rule {
      Rule::EarliestCompletion => min_position(&ready, |op| {
        (
          release_of(op) + inst.duration(op),
          inst.job_of(op),
          inst.machine(op),
        )
      }),
      Rule::ShortestProcessingTime => min_position(&ready, |op| {
        (inst.duration(op), release_of(op), inst.job_of(op))
      }),
      Rule::MostWorkRemaining => min_position(&ready, |op| {
        (Reverse(work_remaining[inst.job_of(op)]), inst.job_of(op))
      }),
    };
    let chosen_op = ready[chosen_idx];

    let j = inst.job_of(chosen_op);
    let m = inst.machine(chosen_op);
    let release_time = release_of(chosen_op);
    let finish_time = release_time + inst.duration(chosen_op);
    // Update the release time tracking arrays
    machine_next_release[m] = finish_time;
    job_next_release[j] = finish_time;
    work_remaining[j] -= inst.duration(chosen_op);
    machine_orders[m].push(chosen_op);

    debug!(
      "Dispatched {:?} on machine {} at [{}, {}]",
      inst.op_from_id(chosen_op),
      m,
      release_time,
      finish_time
    );

    // Replace with the job successor (if exists)
    match inst.succ_job(chosen_op) {
      Some(next) => ready[chosen_idx] = next,
      None => {
        ready.remove(chosen_idx);
      }
    }
  }

  return SolutionCandidate::new(machine_orders);
}

fn min_position<K: Ord>(ready: &[OpId], key: impl Fn(OpId) -> K) -> usize {
  return ready
    .iter()
    .enumerate()
    .min_by_key(|&(_, &op)| key(op))
    .map(|(idx, _)| idx)
    .unwrap_or(0);
}
