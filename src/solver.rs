pub mod enumeration;
pub mod evaluator;
pub mod greedy;
mod neighborhood;
pub mod simulated_annealing;

use crate::data::{Instance, Schedule, SolutionCandidate, Time};
use crate::error::{ConfigurationError, InfeasibleOrderingError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

pub use evaluator::evaluate;

/// The solving strategy, chosen by the caller.
#[derive(Debug, Clone)]
pub enum Strategy {
  Greedy(greedy::Config),
  Enumeration(enumeration::Config),
  SimulatedAnnealing(simulated_annealing::Config),
}

impl Strategy {
  pub fn name(&self) -> &'static str {
    match self {
      Strategy::Greedy(_) => "greedy",
      Strategy::Enumeration(_) => "enumeration",
      Strategy::SimulatedAnnealing(_) => "simulated-annealing",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "solver", rename_all = "kebab-case")]
pub enum Statistics {
  Greedy(greedy::Statistics),
  Enumeration(enumeration::Statistics),
  SimulatedAnnealing(simulated_annealing::Statistics),
  Exact(crate::backend::Statistics),
}

impl Statistics {
  pub fn cpu_time(&self) -> f64 {
    match self {
      Statistics::Greedy(stats) => stats.cpu_time,
      Statistics::Enumeration(stats) => stats.cpu_time,
      Statistics::SimulatedAnnealing(stats) => stats.cpu_time,
      Statistics::Exact(stats) => stats.cpu_time,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Outcome {
  pub schedule: Schedule,
  pub statistics: Statistics,
}

/// Runs one strategy on `inst`. Configurations are checked before any search starts.
pub fn solve(inst: &Instance, strategy: &Strategy) -> Result<Outcome, ConfigurationError> {
  let (schedule, statistics) = match strategy {
    Strategy::Greedy(config) => {
      let (schedule, stats) = greedy::find_solution(inst, config);
      (schedule, Statistics::Greedy(stats))
    }
    Strategy::Enumeration(config) => {
      let (schedule, stats) = enumeration::find_solution(inst, config)?;
      (schedule, Statistics::Enumeration(stats))
    }
    Strategy::SimulatedAnnealing(config) => {
      let (schedule, stats) = simulated_annealing::find_solution(inst, config)?;
      (schedule, Statistics::SimulatedAnnealing(stats))
    }
  };

  #[cfg(debug_assertions)]
  {
    if let Err(err) = verify_solution(inst, &schedule) {
      panic!("{} produced an invalid schedule: {}", strategy.name(), err);
    }
  }

  return Ok(Outcome {
    schedule: schedule,
    statistics: statistics,
  });
}

/// Checks job precedence and machine exclusivity of a timed schedule.
pub fn verify_solution(inst: &Instance, schedule: &Schedule) -> Result<(), InfeasibleOrderingError> {
  let mut release_times = Array1::<Time>::from_elem(inst.n_ops(), 0);
  for (j, job) in schedule.times().iter().enumerate() {
    for (o, t) in job.iter().enumerate() {
      release_times[inst.op_to_id([j, o])] = t.start;
    }
  }

  return verify_release_times(inst, &release_times);
}

pub fn verify_release_times(
  inst: &Instance,
  release_times: &Array1<Time>,
) -> Result<(), InfeasibleOrderingError> {
  // Imported times are untrusted, every end must be representable
  for op in inst.op_ids() {
    if release_times[op].checked_add(inst.duration(op)).is_none() {
      return Err(InfeasibleOrderingError::TimeOverflow {
        op: inst.op_from_id(op),
        start: release_times[op],
      });
    }
  }

  for op in inst.op_ids() {
    if let Some(pre) = inst.pre_job(op) {
      let pre_end = release_times[pre] + inst.duration(pre);
      if release_times[op] < pre_end {
        return Err(InfeasibleOrderingError::Precedence {
          op: inst.op_from_id(op),
          start: release_times[op],
          pre_end: pre_end,
        });
      }
    }
  }

  let candidate = get_orientation_from_release_times(inst, release_times);
  for (m, order) in candidate.machine_orders().iter().enumerate() {
    for pair in order.windows(2) {
      let (a, b) = (pair[0], pair[1]);
      if release_times[a] + inst.duration(a) > release_times[b] {
        return Err(InfeasibleOrderingError::Overlap {
          first: inst.op_from_id(a),
          second: inst.op_from_id(b),
          machine: m,
        });
      }
    }
  }

  Ok(())
}

/// Machine orders implied by start times, ties broken by operation id.
pub fn get_orientation_from_release_times(
  inst: &Instance,
  release_times: &Array1<Time>,
) -> SolutionCandidate {
  let machine_orders = (0..inst.n_machines())
    .map(|m| {
      let mut ops = inst.machine_ops(m).to_vec();
      ops.sort_by_key(|&op| (release_times[op], op));
      ops
    })
    .collect();

  return SolutionCandidate::new(machine_orders);
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::data::test::ft03;

  #[test]
  fn test_solve_dispatches_every_strategy() {
    let inst = ft03();
    let strategies = vec![
      Strategy::Greedy(greedy::Config::default()),
      Strategy::Enumeration(enumeration::Config::default()),
      Strategy::SimulatedAnnealing(simulated_annealing::Config::default()),
    ];

    for strategy in &strategies {
      let outcome = solve(&inst, strategy).unwrap();
      assert!(verify_solution(&inst, &outcome.schedule).is_ok());
      assert!(outcome.schedule.makespan() >= inst.lower_bound());
      assert!(outcome.statistics.cpu_time() >= 0.0);
    }
  }

  #[test]
  fn test_solve_rejects_invalid_configuration() {
    let inst = ft03();
    let config = simulated_annealing::Config {
      cooling_rate: 1.5,
      ..Default::default()
    };

    let err = solve(&inst, &Strategy::SimulatedAnnealing(config)).unwrap_err();
    assert_eq!(err.field, "cooling_rate");
  }

  #[test]
  fn test_verify_detects_precedence_violation() {
    let inst = ft03();
    let mut release_times = Array1::<Time>::from_elem(inst.n_ops(), 0);
    release_times[1] = 1;

    assert_eq!(
      verify_release_times(&inst, &release_times),
      Err(InfeasibleOrderingError::Precedence {
        op: [0, 1],
        start: 1,
        pre_end: 3
      })
    );
  }
}
