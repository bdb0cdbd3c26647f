use crate::data::{Machine, SolutionCandidate};
use rand::seq::SliceRandom;
use rand::Rng;

/// Local change to one machine order. Moves never transfer operations between
/// machines, so a candidate stays a valid partition; only acyclicity can break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
  /// Exchange the operations at `position` and `position + 1`.
  AdjacentSwap { machine: Machine, position: usize },
  /// Take the operation at `from` out and reinsert it at `to`.
  Insertion {
    machine: Machine,
    from: usize,
    to: usize,
  },
}

impl Move {
  pub fn apply(&self, candidate: &mut SolutionCandidate) {
    match *self {
      Move::AdjacentSwap { machine, position } => {
        candidate
          .machine_order_mut(machine)
          .swap(position, position + 1);
      }
      Move::Insertion { machine, from, to } => {
        let order = candidate.machine_order_mut(machine);
        let op = order.remove(from);
        order.insert(to, op);
      }
    }
  }

  pub fn undo(&self, candidate: &mut SolutionCandidate) {
    match *self {
      Move::AdjacentSwap { .. } => self.apply(candidate),
      Move::Insertion { machine, from, to } => Move::Insertion {
        machine: machine,
        from: to,
        to: from,
      }
      .apply(candidate),
    }
  }
}

/// Machines whose order can be perturbed at all.
pub fn eligible_machines(candidate: &SolutionCandidate) -> Vec<Machine> {
  return candidate
    .machine_orders()
    .iter()
    .enumerate()
    .filter(|(_, order)| order.len() >= 2)
    .map(|(m, _)| m)
    .collect();
}

/// Picks a machine uniformly among `eligible`, then a move on it.
///
/// With `insertion_probability == 0` no random number is spent on the move kind.
pub fn propose<R: Rng>(
  eligible: &[Machine],
  candidate: &SolutionCandidate,
  insertion_probability: f64,
  rng: &mut R,
) -> Option<Move> {
  let &machine = eligible.choose(rng)?;
  let len = candidate.machine_order(machine).len();

  if insertion_probability > 0.0 && rng.gen::<f64>() < insertion_probability {
    let from = rng.gen_range(0, len);
    // Skip `from` itself, reinserting in place changes nothing
    let mut to = rng.gen_range(0, len - 1);
    if to >= from {
      to += 1;
    }
    return Some(Move::Insertion {
      machine: machine,
      from: from,
      to: to,
    });
  }

  return Some(Move::AdjacentSwap {
    machine: machine,
    position: rng.gen_range(0, len - 1),
  });
}
