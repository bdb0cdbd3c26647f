use jobshop::data::{Instance, Schedule};
use jobshop::error::{Error, InfeasibleOrderingError};
use jobshop::json::{self, SolutionFile};
use jobshop::parser;
use jobshop::solver::{self, Outcome, Strategy};
use std::path::Path;

fn ft03() -> Instance {
  parser::read_instance(&Path::new(env!("CARGO_MANIFEST_DIR")).join("instances/ft03.json"))
    .unwrap()
}

#[test]
fn sample_instances_agree() {
  let from_json = ft03();
  let from_text =
    parser::read_instance(&Path::new(env!("CARGO_MANIFEST_DIR")).join("instances/ft03.txt"))
      .unwrap();

  assert_eq!(from_json.name(), "ft03");
  assert_eq!(from_json.bks(), Some(7));
  assert_eq!(from_text.name(), "ft03");
  assert_eq!(from_text.durations(), from_json.durations());
  assert_eq!(from_text.machines(), from_json.machines());
}

#[test]
fn larger_sample_is_solved() {
  let inst =
    parser::read_instance(&Path::new(env!("CARGO_MANIFEST_DIR")).join("instances/ft06.txt"))
      .unwrap();
  assert_eq!(inst.n_jobs(), 6);
  assert_eq!(inst.n_machines(), 6);

  let outcome = solver::solve(&inst, &Strategy::Greedy(Default::default())).unwrap();
  assert!(outcome.schedule.makespan() >= 55);
  assert!(solver::verify_solution(&inst, &outcome.schedule).is_ok());
}

#[test]
fn solutions_survive_a_round_trip() {
  let inst = ft03();
  for strategy in vec![
    Strategy::Greedy(Default::default()),
    Strategy::Enumeration(Default::default()),
    Strategy::SimulatedAnnealing(Default::default()),
  ] {
    let outcome = solver::solve(&inst, &strategy).unwrap();
    let serialized = json::solution_to_string(&inst, &outcome).unwrap();
    let file = json::parse_solution(&serialized).unwrap();

    assert_eq!(file.instance, "ft03");
    assert_eq!(file.makespan, outcome.schedule.makespan());
    assert_eq!(file.lower_bound, 7);
    assert_eq!(file.to_schedule(&inst).unwrap(), outcome.schedule);

    let value: serde_json::Value = serde_json::from_str(&serialized).unwrap();
    assert_eq!(value["statistics"]["solver"], strategy.name());
  }
}

#[test]
fn gap_is_reported_against_bks() {
  let inst = ft03();
  let outcome = solver::solve(&inst, &Strategy::Greedy(Default::default())).unwrap();
  let file = SolutionFile::new(&inst, &outcome);

  let gap = file.gap_percent.unwrap();
  assert!((gap - 200.0 / 7.0).abs() < 1e-9);
}

#[test]
fn tampered_solutions_are_rejected() {
  let inst = ft03();
  let greedy = solver::solve(&inst, &Strategy::Greedy(Default::default())).unwrap();
  let optimal = Schedule::from_start_times(&inst, &[vec![0, 3, 5], vec![0, 3, 4], vec![0, 3, 5]])
    .unwrap();
  let file = SolutionFile::new(
    &inst,
    &Outcome {
      schedule: optimal,
      statistics: greedy.statistics,
    },
  );
  assert_eq!(file.makespan, 7);

  let mut wrong_end = file.clone();
  wrong_end.schedule[0].operations[0].end += 1;
  match wrong_end.to_schedule(&inst) {
    Err(Error::SolutionMismatch { op, .. }) => assert_eq!(op, [0, 0]),
    other => panic!("unexpected result {:?}", other),
  }

  // Job 2 moves onto machine 1 while job 0 still occupies it
  let mut overlapping = file.clone();
  overlapping.schedule[2].operations[2].start = 4;
  overlapping.schedule[2].operations[2].end = 6;
  match overlapping.to_schedule(&inst) {
    Err(Error::Infeasible(InfeasibleOrderingError::Overlap { machine: 1, .. })) => {}
    other => panic!("unexpected result {:?}", other),
  }

  // An end past the largest time would otherwise wrap around to the front
  let mut wrapping = file.clone();
  wrapping.schedule[0].operations[0].start = u32::MAX - 1;
  match wrapping.to_schedule(&inst) {
    Err(Error::Infeasible(InfeasibleOrderingError::TimeOverflow { op, start })) => {
      assert_eq!(op, [0, 0]);
      assert_eq!(start, u32::MAX - 1);
    }
    other => panic!("unexpected result {:?}", other),
  }

  let mut late = file.clone();
  late.makespan = 8;
  match late.to_schedule(&inst) {
    Err(Error::SolutionMismatch { .. }) => {}
    other => panic!("unexpected result {:?}", other),
  }

  let mut truncated = file;
  truncated.schedule[1].operations.pop();
  match truncated.to_schedule(&inst) {
    Err(Error::Infeasible(InfeasibleOrderingError::MissingOperations { missing: 1 })) => {}
    other => panic!("unexpected result {:?}", other),
  }
}
