#[macro_use]
extern crate log;

use clap::{App, Arg, ArgMatches};
use jobshop::error::ConfigurationError;
use jobshop::json::solution_to_string;
use jobshop::parser::read_instance;
use jobshop::solver::{self, enumeration, greedy, simulated_annealing, Strategy};
use std::error::Error;
use std::fs;
use std::path::Path;
use std::process;
use std::str::FromStr;
use std::time::Duration;

fn main() {
  env_logger::init();

  let matches = App::new("jobshop")
    .version("0.1")
    .about("Exact and heuristic solvers for the job shop scheduling problem")
    .arg(
      Arg::with_name("instance")
        .long("instance")
        .help("Instance file (.json or OR-Library text)")
        .takes_value(true)
        .required(true),
    )
    .arg(
      Arg::with_name("solver")
        .long("solver")
        .help("Solver to use")
        .possible_values(&["greedy", "enumeration", "simulated-annealing"])
        .takes_value(true)
        .required(true),
    )
    .arg(
      Arg::with_name("output")
        .long("output")
        .help("Write the solution JSON to this file instead of stdout")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("seed")
        .long("seed")
        .help("Seed for rng")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("timeout")
        .long("timeout")
        .help("Timeout (in s) after which to abort the search")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("node-limit")
        .long("node-limit")
        .help("Maximum number of search nodes for enumeration")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("greedy-rule")
        .long("greedy-rule")
        .help("Dispatch rule for the greedy solver")
        .possible_values(&["ect", "spt", "mwr"])
        .takes_value(true),
    )
    .arg(
      Arg::with_name("branching")
        .long("branching")
        .help("Branching scheme for enumeration")
        .possible_values(&["ready", "active"])
        .takes_value(true),
    )
    .arg(
      Arg::with_name("sa-initial-temperature")
        .long("sa-initial-temperature")
        .help("Start temperature for simulated annealing")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("sa-cooling-rate")
        .long("sa-cooling-rate")
        .help("Geometric cooling factor for simulated annealing")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("sa-iterations")
        .long("sa-iterations")
        .help("Iterations per temperature level")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("sa-minimum-temperature")
        .long("sa-minimum-temperature")
        .help("Temperature at which simulated annealing stops")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("sa-max-iterations")
        .long("sa-max-iterations")
        .help("Total iteration budget for simulated annealing")
        .takes_value(true),
    )
    .arg(
      Arg::with_name("sa-insertion-probability")
        .long("sa-insertion-probability")
        .help("Probability of an insertion move instead of an adjacent swap")
        .takes_value(true),
    )
    .get_matches();

  if let Err(err) = run(&matches) {
    error!("{}", err);
    eprintln!("error: {}", err);
    process::exit(1);
  }
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
  let file = matches.value_of("instance").unwrap_or_default();
  let instance = read_instance(Path::new(file))?;
  info!(
    "Loaded {} with {} jobs on {} machines",
    instance.name(),
    instance.n_jobs(),
    instance.n_machines()
  );

  let strategy = build_strategy(matches)?;
  let outcome = solver::solve(&instance, &strategy)?;
  let makespan = outcome.schedule.makespan();

  println!("{}", makespan);
  if let Some(gap) = instance.gap_percent(makespan) {
    info!("Gap to best known solution: {:.2}%", gap);
  }

  let solution = solution_to_string(&instance, &outcome)?;
  match matches.value_of("output") {
    Some(path) => fs::write(path, solution)?,
    None => println!("{}", solution),
  }

  Ok(())
}

fn build_strategy(matches: &ArgMatches) -> Result<Strategy, ConfigurationError> {
  let timeout = match parse_opt(matches, "timeout")? {
    Some(secs) => Some(timeout_from_secs(secs)?),
    None => None,
  };

  let strategy = match matches.value_of("solver").unwrap_or_default() {
    "greedy" => Strategy::Greedy(greedy::Config {
      rule: parse_opt(matches, "greedy-rule")?.unwrap_or_default(),
    }),
    "enumeration" => Strategy::Enumeration(enumeration::Config {
      node_limit: parse_opt(matches, "node-limit")?,
      timeout: timeout,
      branching: parse_opt(matches, "branching")?.unwrap_or_default(),
    }),
    "simulated-annealing" => {
      let defaults = simulated_annealing::Config::default();
      Strategy::SimulatedAnnealing(simulated_annealing::Config {
        initial_temperature: parse_opt(matches, "sa-initial-temperature")?
          .unwrap_or(defaults.initial_temperature),
        cooling_rate: parse_opt(matches, "sa-cooling-rate")?.unwrap_or(defaults.cooling_rate),
        iterations_per_temperature: parse_opt(matches, "sa-iterations")?
          .unwrap_or(defaults.iterations_per_temperature),
        minimum_temperature: parse_opt(matches, "sa-minimum-temperature")?
          .unwrap_or(defaults.minimum_temperature),
        seed: parse_opt(matches, "seed")?.unwrap_or(defaults.seed),
        max_iterations: parse_opt(matches, "sa-max-iterations")?,
        timeout: timeout,
        insertion_probability: parse_opt(matches, "sa-insertion-probability")?
          .unwrap_or(defaults.insertion_probability),
      })
    }
    other => {
      return Err(ConfigurationError::new(
        "solver",
        format!("unknown solver `{}`", other),
      ))
    }
  };

  debug!("Using strategy {:?}", strategy);
  Ok(strategy)
}

fn timeout_from_secs(secs: f64) -> Result<Duration, ConfigurationError> {
  if !(secs.is_finite() && secs >= 0.0) {
    return Err(ConfigurationError::new("timeout", "must be a non-negative number"));
  }
  // Duration::from_secs_f64 panics beyond u64::MAX seconds
  if secs >= u64::MAX as f64 {
    return Err(ConfigurationError::new("timeout", "is too large"));
  }
  Ok(Duration::from_secs_f64(secs))
}

/// Parses an optional argument, naming the flag when its value is malformed.
fn parse_opt<T: FromStr>(
  matches: &ArgMatches,
  name: &'static str,
) -> Result<Option<T>, ConfigurationError> {
  match matches.value_of(name) {
    Some(value) => value
      .parse()
      .map(Some)
      .map_err(|_| ConfigurationError::new(name, format!("cannot parse `{}`", value))),
    None => Ok(None),
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_timeout_from_secs() {
    assert_eq!(timeout_from_secs(1.5), Ok(Duration::from_millis(1500)));
    assert_eq!(timeout_from_secs(1e30).unwrap_err().field, "timeout");
    assert_eq!(timeout_from_secs(-1.0).unwrap_err().field, "timeout");
    assert_eq!(timeout_from_secs(f64::NAN).unwrap_err().field, "timeout");
  }
}
