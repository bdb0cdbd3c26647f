//! Turns per-machine orderings into timed schedules.
//!
//! The disjunctive graph is kept as index arrays: every operation has at most
//! one job predecessor (fixed by the instance) and at most one machine
//! predecessor (fixed by the candidate), so `pre`/`succ` arrays over operation
//! ids describe all edges. Start times follow from a longest path relaxation
//! in topological order (Kahn), which also detects cyclic orderings.

use crate::data::{Edge, Instance, OpId, Schedule, SolutionCandidate, Time};
use crate::error::InfeasibleOrderingError;
use ndarray::Array1;
use std::cmp;
use std::collections::VecDeque;

/// Computes the semi-active schedule induced by `candidate`.
pub fn evaluate(
  inst: &Instance,
  candidate: &SolutionCandidate,
) -> Result<Schedule, InfeasibleOrderingError> {
  let release_times = get_release_times(inst, candidate)?;
  return Ok(Schedule::from_release_times(
    inst,
    &release_times,
    candidate.clone(),
  ));
}

/// Makespan of `candidate` without materializing the schedule.
pub fn makespan(inst: &Instance, candidate: &SolutionCandidate) -> Result<Time, InfeasibleOrderingError> {
  let release_times = get_release_times(inst, candidate)?;
  let cmax = inst
    .op_ids()
    .map(|op| release_times[op] + inst.duration(op))
    .max()
    .unwrap_or(0);
  return Ok(cmax);
}

/// Start time of every operation, indexed by operation id.
pub fn get_release_times(
  inst: &Instance,
  candidate: &SolutionCandidate,
) -> Result<Array1<Time>, InfeasibleOrderingError> {
  let machine_edges = get_machine_edges(inst, candidate)?;
  let (pre_machine, succ_machine) = get_pre_succ_relations(inst, &machine_edges);

  let mut in_degree = Array1::<u8>::from_elem(inst.n_ops(), 0);
  let mut open = VecDeque::new();
  for op in inst.op_ids() {
    let degree = inst.pre_job(op).is_some() as u8 + pre_machine[op].is_some() as u8;
    in_degree[op] = degree;
    if degree == 0 {
      open.push_back(op);
    }
  }

  let mut release_times = Array1::<Time>::from_elem(inst.n_ops(), 0);
  let mut labelled = 0;
  while let Some(node) = open.pop_front() {
    labelled += 1;
    let end = release_times[node] + inst.duration(node);

    // A job successor always runs on another machine, so the two never coincide
    for &succ in [inst.succ_job(node), succ_machine[node]].iter().flatten() {
      release_times[succ] = cmp::max(release_times[succ], end);
      in_degree[succ] -= 1;
      if in_degree[succ] == 0 {
        open.push_back(succ);
      }
    }
  }

  if labelled < inst.n_ops() {
    log::trace!(
      "cycle detected, {} of {} operations labelled",
      labelled,
      inst.n_ops()
    );
    return Err(InfeasibleOrderingError::Cycle {
      unscheduled: inst.n_ops() - labelled,
    });
  }

  return Ok(release_times);
}

/// Resource edges between consecutive operations of each machine order.
///
/// Fails if the orders are not a partition of the operations by machine.
pub fn get_machine_edges(
  inst: &Instance,
  candidate: &SolutionCandidate,
) -> Result<Vec<Edge>, InfeasibleOrderingError> {
  let orders = candidate.machine_orders();
  if orders.len() != inst.n_machines() {
    return Err(InfeasibleOrderingError::MachineCount {
      expected: inst.n_machines(),
      found: orders.len(),
    });
  }

  let mut seen = Array1::<bool>::from_elem(inst.n_ops(), false);
  let mut assigned = 0;
  let mut edges = Vec::with_capacity(inst.n_ops());
  for (m, order) in orders.iter().enumerate() {
    for (i, &op) in order.iter().enumerate() {
      if op >= inst.n_ops() {
        return Err(InfeasibleOrderingError::UnknownOperationId { id: op });
      }
      if inst.machine(op) != m {
        return Err(InfeasibleOrderingError::ForeignOperation {
          op: inst.op_from_id(op),
          machine: m,
        });
      }
      if seen[op] {
        return Err(InfeasibleOrderingError::DuplicateOperation {
          op: inst.op_from_id(op),
        });
      }
      seen[op] = true;
      assigned += 1;

      if i > 0 {
        edges.push((order[i - 1], op));
      }
    }
  }

  if assigned < inst.n_ops() {
    return Err(InfeasibleOrderingError::MissingOperations {
      missing: inst.n_ops() - assigned,
    });
  }

  return Ok(edges);
}

/// Expects every node to appear at most once as source and once as target.
pub fn get_pre_succ_relations(
  inst: &Instance,
  edges: &[Edge],
) -> (Array1<Option<OpId>>, Array1<Option<OpId>>) {
  let mut pre = Array1::<Option<OpId>>::from_elem(inst.n_ops(), None);
  let mut succ = Array1::<Option<OpId>>::from_elem(inst.n_ops(), None);

  for &(v, w) in edges {
    debug_assert!(pre[w].is_none(), "duplicate predecessor for {}", w);
    debug_assert!(succ[v].is_none(), "duplicate successor for {}", v);
    pre[w] = Some(v);
    succ[v] = Some(w);
  }

  return (pre, succ);
}
