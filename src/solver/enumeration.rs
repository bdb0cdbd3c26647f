//! Depth-first branch and bound over operation interleavings.
//!
//! A node is a partial schedule built by appending ready operations to their
//! machines. Appending is enough to reach every semi-active schedule, so an
//! exhausted search certifies optimality.

use crate::data::{Instance, OpId, Schedule, SolutionCandidate, Time};
use crate::error::ConfigurationError;
use crate::solver::{evaluator, greedy};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::cmp;
use std::str::FromStr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Branching {
  /// Branch on every ready operation.
  Ready,
  /// Branch on the Giffler-Thompson conflict set only (active schedules).
  Active,
}

impl Default for Branching {
  fn default() -> Self {
    Branching::Ready
  }
}

impl FromStr for Branching {
  type Err = ConfigurationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "ready" => Ok(Branching::Ready),
      "active" => Ok(Branching::Active),
      _ => Err(ConfigurationError::new(
        "branching",
        format!("unknown branching `{}`", s),
      )),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub node_limit: Option<u64>,
  pub timeout: Option<Duration>,
  pub branching: Branching,
}

impl Config {
  pub fn validate(&self) -> Result<(), ConfigurationError> {
    if self.node_limit == Some(0) {
      return Err(ConfigurationError::new("node_limit", "must be positive"));
    }
    if self.timeout == Some(Duration::from_secs(0)) {
      return Err(ConfigurationError::new("timeout", "must be positive"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
  pub branching: Branching,
  pub initial_makespan: Time,
  pub nodes_explored: u64,
  /// Children cut off because their lower bound could not beat the incumbent.
  pub nodes_pruned: u64,
  pub leaves: u64,
  pub proven_optimal: bool,
  pub cpu_time: f64,
}

pub fn find_solution(
  inst: &Instance,
  config: &Config,
) -> Result<(Schedule, Statistics), ConfigurationError> {
  config.validate()?;

  let start = Instant::now();
  let (incumbent, _) = greedy::find_solution(inst, &greedy::Config::default());
  let initial_makespan = incumbent.makespan();
  info!(
    "Starting enumeration with incumbent {} and lower bound {}",
    initial_makespan,
    inst.lower_bound()
  );

  let mut search = Search::new(inst, config, start, incumbent);
  if inst.lower_bound() < initial_makespan {
    search.branch();
  } else {
    debug!("Incumbent matches the trivial lower bound, skipping search");
  }

  let proven_optimal = !search.interrupted;
  let stats = Statistics {
    branching: config.branching,
    initial_makespan: initial_makespan,
    nodes_explored: search.nodes_explored,
    nodes_pruned: search.nodes_pruned,
    leaves: search.leaves,
    proven_optimal: proven_optimal,
    cpu_time: start.elapsed().as_secs_f64(),
  };

  if proven_optimal {
    info!(
      "Proved optimal makespan {} ({} nodes)",
      search.best.makespan(),
      stats.nodes_explored
    );
  } else {
    info!(
      "Stopping due to budget at {} ({} nodes)",
      search.best.makespan(),
      stats.nodes_explored
    );
  }

  return Ok((search.best, stats));
}

/// Values overwritten by placing an operation, restored on backtrack.
struct Placement {
  op: OpId,
  job_ready: Time,
  machine_free: Time,
  makespan: Time,
}

struct Search<'a> {
  inst: &'a Instance,
  config: &'a Config,
  start: Instant,

  job_next: Vec<Option<OpId>>,
  job_ready: Vec<Time>,
  job_remaining: Vec<Time>,
  machine_free: Vec<Time>,
  machine_remaining: Vec<Time>,
  orders: SolutionCandidate,
  makespan: Time,
  placed: usize,

  best: Schedule,
  nodes_explored: u64,
  nodes_pruned: u64,
  leaves: u64,
  interrupted: bool,
}

impl<'a> Search<'a> {
  fn new(inst: &'a Instance, config: &'a Config, start: Instant, incumbent: Schedule) -> Self {
    Search {
      inst: inst,
      config: config,
      start: start,
      job_next: (0..inst.n_jobs())
        .map(|j| Some(inst.op_to_id([j, 0])))
        .collect(),
      job_ready: vec![0; inst.n_jobs()],
      job_remaining: (0..inst.n_jobs())
        .map(|j| inst.job_total_duration(j))
        .collect(),
      machine_free: vec![0; inst.n_machines()],
      machine_remaining: (0..inst.n_machines())
        .map(|m| inst.machine_total_duration(m))
        .collect(),
      orders: SolutionCandidate::new(vec![Vec::new(); inst.n_machines()]),
      makespan: 0,
      placed: 0,
      best: incumbent,
      nodes_explored: 0,
      nodes_pruned: 0,
      leaves: 0,
      interrupted: false,
    }
  }

  fn budget_exhausted(&self) -> bool {
    if let Some(limit) = self.config.node_limit {
      if self.nodes_explored >= limit {
        return true;
      }
    }
    if let Some(timeout) = self.config.timeout {
      if self.start.elapsed() >= timeout {
        return true;
      }
    }
    return false;
  }

  fn branch(&mut self) {
    if self.budget_exhausted() {
      self.interrupted = true;
      return;
    }
    self.nodes_explored += 1;

    if self.placed == self.inst.n_ops() {
      self.evaluate_leaf();
      return;
    }

    let mut children: Vec<(Time, OpId)> = self
      .candidates()
      .into_iter()
      .map(|op| (self.lower_bound_after(op), op))
      .collect();
    // Operation ids grow with the job id, so ties resolve by job
    children.sort_unstable();

    for (i, &(bound, op)) in children.iter().enumerate() {
      if bound >= self.best.makespan() {
        // Children are sorted by bound, none of the rest can improve either
        self.nodes_pruned += (children.len() - i) as u64;
        break;
      }

      let placement = self.place(op);
      self.branch();
      self.undo(placement);

      if self.interrupted {
        return;
      }
    }
  }

  fn evaluate_leaf(&mut self) {
    self.leaves += 1;
    match evaluator::evaluate(self.inst, &self.orders) {
      Ok(schedule) => {
        if schedule.makespan() < self.best.makespan() {
          debug!(
            "Improved incumbent to {} (node {})",
            schedule.makespan(),
            self.nodes_explored
          );
          self.best = schedule;
        }
      }
      Err(err) => trace!("Discarding infeasible leaf: {}", err),
    }
  }

  fn ready(&self) -> impl Iterator<Item = OpId> + '_ {
    return self.job_next.iter().filter_map(|&op| op);
  }

  fn release(&self, op: OpId) -> Time {
    return cmp::max(
      self.job_ready[self.inst.job_of(op)],
      self.machine_free[self.inst.machine(op)],
    );
  }

  fn candidates(&self) -> Vec<OpId> {
    match self.config.branching {
      Branching::Ready => self.ready().collect(),
      Branching::Active => {
        // Giffler and Thompson, "Algorithms for Solving Production-Scheduling Problems."
        let earliest = self
          .ready()
          .min_by_key(|&op| (self.release(op) + self.inst.duration(op), op));
        match earliest {
          Some(earliest) => {
            let completion = self.release(earliest) + self.inst.duration(earliest);
            let machine = self.inst.machine(earliest);
            self
              .ready()
              .filter(|&op| self.inst.machine(op) == machine && self.release(op) < completion)
              .collect()
          }
          None => Vec::new(),
        }
      }
    }
  }

  /// Component-wise maximum of partial makespan, job and machine bounds after placing `op`.
  fn lower_bound_after(&self, op: OpId) -> Time {
    let j = self.inst.job_of(op);
    let m = self.inst.machine(op);
    let duration = self.inst.duration(op);
    let end = self.release(op) + duration;

    let mut bound = cmp::max(self.makespan, end);
    for (k, (&ready, &remaining)) in self.job_ready.iter().zip(&self.job_remaining).enumerate() {
      let job_bound = if k == j {
        end + (remaining - duration)
      } else {
        ready + remaining
      };
      bound = cmp::max(bound, job_bound);
    }
    for (k, (&free, &remaining)) in self
      .machine_free
      .iter()
      .zip(&self.machine_remaining)
      .enumerate()
    {
      let machine_bound = if k == m {
        end + (remaining - duration)
      } else {
        free + remaining
      };
      bound = cmp::max(bound, machine_bound);
    }

    return bound;
  }

  fn place(&mut self, op: OpId) -> Placement {
    let j = self.inst.job_of(op);
    let m = self.inst.machine(op);
    let duration = self.inst.duration(op);
    let end = self.release(op) + duration;

    let placement = Placement {
      op: op,
      job_ready: self.job_ready[j],
      machine_free: self.machine_free[m],
      makespan: self.makespan,
    };

    self.job_ready[j] = end;
    self.machine_free[m] = end;
    self.job_remaining[j] -= duration;
    self.machine_remaining[m] -= duration;
    self.makespan = cmp::max(self.makespan, end);
    self.job_next[j] = self.inst.succ_job(op);
    self.orders.machine_order_mut(m).push(op);
    self.placed += 1;

    return placement;
  }

  fn undo(&mut self, placement: Placement) {
    let op = placement.op;
    let j = self.inst.job_of(op);
    let m = self.inst.machine(op);
    let duration = self.inst.duration(op);

    self.job_ready[j] = placement.job_ready;
    self.machine_free[m] = placement.machine_free;
    self.job_remaining[j] += duration;
    self.machine_remaining[m] += duration;
    self.makespan = placement.makespan;
    self.job_next[j] = Some(op);
    self.orders.machine_order_mut(m).pop();
    self.placed -= 1;
  }
}
