use crate::data::{Instance, Schedule, SolutionCandidate, Time};
use crate::error::{ConfigurationError, Error};
use crate::solver::neighborhood;
use crate::solver::{evaluator, greedy};
use log::{debug, info, trace};
use rand::{Rng, SeedableRng};
use rand_chacha;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Config {
  pub initial_temperature: f64,
  /// Factor applied to the temperature after each level, in (0, 1).
  pub cooling_rate: f64,
  pub iterations_per_temperature: usize,
  /// The run stops once the temperature is no longer above this value.
  pub minimum_temperature: f64,
  pub seed: u64,
  pub max_iterations: Option<u64>,
  pub timeout: Option<Duration>,
  /// Share of proposals that reinsert an operation instead of swapping neighbours.
  pub insertion_probability: f64,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      initial_temperature: 1000.0,
      cooling_rate: 0.95,
      iterations_per_temperature: 100,
      minimum_temperature: 1.0,
      seed: 0,
      max_iterations: None,
      timeout: None,
      insertion_probability: 0.0,
    }
  }
}

impl Config {
  pub fn validate(&self) -> Result<(), ConfigurationError> {
    if !(self.initial_temperature.is_finite() && self.initial_temperature > 0.0) {
      return Err(ConfigurationError::new(
        "initial_temperature",
        "must be a positive number",
      ));
    }
    if !(self.minimum_temperature.is_finite() && self.minimum_temperature > 0.0) {
      return Err(ConfigurationError::new(
        "minimum_temperature",
        "must be a positive number",
      ));
    }
    if self.minimum_temperature >= self.initial_temperature {
      return Err(ConfigurationError::new(
        "minimum_temperature",
        "must be below initial_temperature",
      ));
    }
    if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
      return Err(ConfigurationError::new(
        "cooling_rate",
        "must lie strictly between 0 and 1",
      ));
    }
    if self.iterations_per_temperature == 0 {
      return Err(ConfigurationError::new(
        "iterations_per_temperature",
        "must be positive",
      ));
    }
    if self.max_iterations == Some(0) {
      return Err(ConfigurationError::new("max_iterations", "must be positive"));
    }
    if self.timeout == Some(Duration::from_secs(0)) {
      return Err(ConfigurationError::new("timeout", "must be positive"));
    }
    if !(self.insertion_probability >= 0.0 && self.insertion_probability < 1.0) {
      return Err(ConfigurationError::new(
        "insertion_probability",
        "must lie in [0, 1)",
      ));
    }
    Ok(())
  }
}

/// Best makespan after a temperature level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
  pub step: usize,
  pub temperature: f64,
  pub best: Time,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
  pub seed: u64,
  pub initial_makespan: Time,
  pub best_makespan: Time,
  pub final_makespan: Time,
  pub improvement_percent: f64,
  pub iterations: u64,
  pub accepted_moves: u64,
  pub rejected_moves: u64,
  /// Rejected moves whose orderings were cyclic.
  pub infeasible_moves: u64,
  /// False if a budget stopped the run before the minimum temperature was reached.
  pub converged: bool,
  pub cpu_time: f64,
  pub trace: Vec<TracePoint>,
}

/// Anneals starting from the greedy dispatch solution.
pub fn find_solution(
  inst: &Instance,
  config: &Config,
) -> Result<(Schedule, Statistics), ConfigurationError> {
  config.validate()?;

  let start = Instant::now();
  let (initial, _) = greedy::find_solution(inst, &greedy::Config::default());

  return Ok(run_sa(inst, config, start, initial));
}

/// Anneals starting from a caller supplied candidate.
pub fn find_solution_from(
  inst: &Instance,
  config: &Config,
  initial: &SolutionCandidate,
) -> Result<(Schedule, Statistics), Error> {
  config.validate()?;

  let start = Instant::now();
  let initial = evaluator::evaluate(inst, initial)?;

  return Ok(run_sa(inst, config, start, initial));
}

fn run_sa(inst: &Instance, config: &Config, start: Instant, initial: Schedule) -> (Schedule, Statistics) {
  let mut rng = rand_chacha::ChaChaRng::seed_from_u64(config.seed);

  let initial_makespan = initial.makespan();
  let mut best = initial.clone();
  let mut current = initial.into_candidate();
  let mut current_cost = initial_makespan;
  let eligible = neighborhood::eligible_machines(&current);

  let mut temperature = config.initial_temperature;
  let mut step = 0;
  let mut iterations = 0;
  let mut accepted_moves = 0;
  let mut rejected_moves = 0;
  let mut infeasible_moves = 0;
  let mut converged = true;
  let mut trace = Vec::new();

  info!(
    "Starting annealing with makespan {}, temp {}, seed {}",
    initial_makespan, temperature, config.seed
  );
  if eligible.is_empty() {
    debug!("No machine processes more than one operation, nothing to anneal");
  }

  while temperature > config.minimum_temperature && !eligible.is_empty() {
    for _ in 0..config.iterations_per_temperature {
      if budget_exhausted(config, iterations, &start) {
        converged = false;
        break;
      }
      iterations += 1;

      let next_move = match neighborhood::propose(
        &eligible,
        &current,
        config.insertion_probability,
        &mut rng,
      ) {
        Some(next_move) => next_move,
        None => break,
      };
      next_move.apply(&mut current);

      // Cyclic orderings cost infinitely much and are never accepted
      let candidate_cost = match evaluator::makespan(inst, &current) {
        Ok(cost) => Some(cost),
        Err(err) => {
          trace!("Move {:?} is infeasible: {}", next_move, err);
          infeasible_moves += 1;
          None
        }
      };
      let accepted_cost =
        candidate_cost.filter(|&cost| metropolis(cost, current_cost, temperature, &mut rng));

      match accepted_cost {
        Some(cost) => {
          current_cost = cost;
          accepted_moves += 1;
          trace!(
            "Accepted move {:?} to {} (iteration {}, temp {:.3})",
            next_move,
            cost,
            iterations,
            temperature
          );

          if cost < best.makespan() {
            match evaluator::evaluate(inst, &current) {
              Ok(schedule) => best = schedule,
              Err(err) => unreachable!("accepted an infeasible ordering: {}", err),
            }
            debug!(
              "Improved best to {} (iteration {}, temp {:.3})",
              cost, iterations, temperature
            );
          }
        }
        None => {
          next_move.undo(&mut current);
          rejected_moves += 1;
        }
      }
    }

    trace.push(TracePoint {
      step: step,
      temperature: temperature,
      best: best.makespan(),
    });
    trace!(
      "Finished level {} at temp {:.3}, current {}, best {}",
      step,
      temperature,
      current_cost,
      best.makespan()
    );

    if !converged {
      break;
    }
    temperature *= config.cooling_rate;
    step += 1;
  }

  if trace.is_empty() {
    trace.push(TracePoint {
      step: 0,
      temperature: temperature,
      best: best.makespan(),
    });
  }

  let best_makespan = best.makespan();
  let improvement_percent = if initial_makespan > 0 {
    (initial_makespan - best_makespan) as f64 / initial_makespan as f64 * 100.0
  } else {
    0.0
  };

  if converged {
    info!(
      "Reached minimum temperature with {} after {} iterations",
      best_makespan, iterations
    );
  } else {
    info!(
      "Stopping due to budget at {} after {} iterations",
      best_makespan, iterations
    );
  }

  let stats = Statistics {
    seed: config.seed,
    initial_makespan: initial_makespan,
    best_makespan: best_makespan,
    final_makespan: current_cost,
    improvement_percent: improvement_percent,
    iterations: iterations,
    accepted_moves: accepted_moves,
    rejected_moves: rejected_moves,
    infeasible_moves: infeasible_moves,
    converged: converged,
    cpu_time: start.elapsed().as_secs_f64(),
    trace: trace,
  };

  return (best, stats);
}

/// Metropolis criterion.
fn metropolis<R: Rng>(candidate_cost: Time, current_cost: Time, temperature: f64, rng: &mut R) -> bool {
  if candidate_cost <= current_cost {
    return true;
  }
  let delta = (candidate_cost - current_cost) as f64;
  return rng.gen::<f64>() < (-delta / temperature).exp();
}

fn budget_exhausted(config: &Config, iterations: u64, start: &Instant) -> bool {
  if let Some(max_iterations) = config.max_iterations {
    if iterations >= max_iterations {
      return true;
    }
  }
  if let Some(timeout) = config.timeout {
    if start.elapsed() >= timeout {
      return true;
    }
  }
  return false;
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::data::test::ft03;
  use crate::error::InfeasibleOrderingError;
  use crate::solver::verify_solution;

  #[test]
  fn test_ft03_reaches_optimum() {
    let inst = ft03();
    let optimal_runs = (0..20)
      .filter(|&seed| {
        let config = Config {
          seed: seed,
          ..Default::default()
        };
        let (schedule, _) = find_solution(&inst, &config).unwrap();
        schedule.makespan() == 7
      })
      .count();

    assert!(optimal_runs >= 19, "only {} of 20 runs optimal", optimal_runs);
  }

  #[test]
  fn test_default_schedule_length() {
    let (_, stats) = find_solution(&ft03(), &Config::default()).unwrap();

    // 1000 * 0.95^k <= 1 first holds for k = 135
    assert_eq!(stats.trace.len(), 135);
    assert_eq!(stats.iterations, 13_500);
    assert_eq!(
      stats.accepted_moves + stats.rejected_moves,
      stats.iterations
    );
    assert!(stats.infeasible_moves <= stats.rejected_moves);
    assert!(stats.converged);
  }

  #[test]
  fn test_trace_never_increases() {
    let config = Config {
      seed: 3,
      insertion_probability: 0.3,
      ..Default::default()
    };
    let (schedule, stats) = find_solution(&ft03(), &config).unwrap();

    for pair in stats.trace.windows(2) {
      assert!(pair[1].best <= pair[0].best);
      assert!(pair[1].temperature < pair[0].temperature);
      assert_eq!(pair[1].step, pair[0].step + 1);
    }
    assert_eq!(stats.trace.last().map(|p| p.best), Some(schedule.makespan()));
    assert!(stats.best_makespan <= stats.initial_makespan);
    assert!(stats.improvement_percent >= 0.0);
  }

  #[test]
  fn test_same_seed_same_run() {
    let inst = ft03();
    let config = Config {
      seed: 11,
      ..Default::default()
    };
    let (first, first_stats) = find_solution(&inst, &config).unwrap();
    let (second, second_stats) = find_solution(&inst, &config).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_stats.trace, second_stats.trace);
    assert_eq!(first_stats.accepted_moves, second_stats.accepted_moves);
  }

  #[test]
  fn test_iteration_budget() {
    let config = Config {
      max_iterations: Some(250),
      ..Default::default()
    };
    let (schedule, stats) = find_solution(&ft03(), &config).unwrap();

    assert!(!stats.converged);
    assert_eq!(stats.iterations, 250);
    assert_eq!(stats.trace.len(), 3);
    assert!(verify_solution(&ft03(), &schedule).is_ok());
  }

  #[test]
  fn test_start_from_supplied_candidate() {
    let inst = ft03();
    let seed = SolutionCandidate::new(vec![vec![0, 5, 7], vec![1, 3, 8], vec![2, 4, 6]]);
    let (schedule, stats) = find_solution_from(&inst, &Config::default(), &seed).unwrap();
    assert!(schedule.makespan() <= stats.initial_makespan);

    let cyclic = Instance::new(
      "cross",
      2,
      2,
      vec![vec![(0, 1), (1, 1)], vec![(1, 1), (0, 1)]],
      None,
    )
    .unwrap();
    let bad_seed = SolutionCandidate::new(vec![vec![3, 0], vec![1, 2]]);
    match find_solution_from(&cyclic, &Config::default(), &bad_seed) {
      Err(Error::Infeasible(InfeasibleOrderingError::Cycle { .. })) => {}
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[test]
  fn test_single_operation() {
    let inst = Instance::new("single", 1, 1, vec![vec![(0, 2)]], None).unwrap();
    let (schedule, stats) = find_solution(&inst, &Config::default()).unwrap();

    assert_eq!(schedule.makespan(), 2);
    assert_eq!(stats.iterations, 0);
    assert_eq!(stats.trace.len(), 1);
  }

  #[test]
  fn test_validate() {
    let invalid = vec![
      (
        Config {
          initial_temperature: -1.0,
          ..Default::default()
        },
        "initial_temperature",
      ),
      (
        Config {
          cooling_rate: 1.0,
          ..Default::default()
        },
        "cooling_rate",
      ),
      (
        Config {
          iterations_per_temperature: 0,
          ..Default::default()
        },
        "iterations_per_temperature",
      ),
      (
        Config {
          minimum_temperature: 2000.0,
          ..Default::default()
        },
        "minimum_temperature",
      ),
      (
        Config {
          insertion_probability: 1.0,
          ..Default::default()
        },
        "insertion_probability",
      ),
      (
        Config {
          max_iterations: Some(0),
          ..Default::default()
        },
        "max_iterations",
      ),
    ];

    for (config, field) in invalid {
      assert_eq!(config.validate().unwrap_err().field, field);
    }
    assert!(Config::default().validate().is_ok());
  }

  #[test]
  fn test_metropolis() {
    let mut rng = rand_chacha::ChaChaRng::seed_from_u64(0);
    assert!(metropolis(5, 5, 1.0, &mut rng));
    assert!(metropolis(4, 5, 1e-9, &mut rng));
    assert!(!metropolis(6, 5, 1e-9, &mut rng));
  }
}
