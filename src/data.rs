use crate::error::{InfeasibleOrderingError, ValidationError};
use ndarray::Array1;
use std::cmp;
use std::convert::TryFrom;

pub type Machine = usize;
pub type Duration = u32;
pub type Time = u32;

/// `[job, operation index]`
pub type Op = [usize; 2];

/// Flat index of an operation, jobs laid out one after another.
pub type OpId = usize;

pub type Edge = (OpId, OpId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
  pub machine: Machine,
  pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
  operations: Vec<Operation>,
}

impl Job {
  pub fn operations(&self) -> &[Operation] {
    return &self.operations;
  }

  pub fn n_operations(&self) -> usize {
    return self.operations.len();
  }

  pub fn total_duration(&self) -> Duration {
    return self.operations.iter().map(|op| op.duration).sum();
  }
}

/// A validated job shop instance. Read-only once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
  name: String,
  n_jobs: usize,
  n_machines: usize,
  bks: Option<u32>,
  jobs: Vec<Job>,

  // Derived from jobs
  job_offsets: Vec<OpId>,
  durations: Array1<Duration>,
  machines: Array1<Machine>,
  jobs_of_ops: Array1<usize>,
  machine_ops: Vec<Vec<OpId>>,
}

impl Instance {
  /// Builds an instance from `(machine, duration)` pairs per job.
  ///
  /// Signed values are accepted so that negative input surfaces as a
  /// validation error instead of a conversion failure further up.
  pub fn new(
    name: impl Into<String>,
    n_jobs: usize,
    n_machines: usize,
    raw_jobs: Vec<Vec<(i64, i64)>>,
    bks: Option<u32>,
  ) -> Result<Instance, ValidationError> {
    if n_machines == 0 {
      return Err(ValidationError::NoMachines);
    }
    if raw_jobs.is_empty() {
      return Err(ValidationError::NoJobs);
    }
    if raw_jobs.len() != n_jobs {
      return Err(ValidationError::JobCountMismatch {
        expected: n_jobs,
        found: raw_jobs.len(),
      });
    }

    let mut jobs = Vec::with_capacity(n_jobs);
    let mut horizon: u64 = 0;
    for (j, raw_ops) in raw_jobs.into_iter().enumerate() {
      if raw_ops.is_empty() {
        return Err(ValidationError::EmptyJob { job: j });
      }

      let mut seen = vec![false; n_machines];
      let mut operations = Vec::with_capacity(raw_ops.len());
      for (o, (machine, duration)) in raw_ops.into_iter().enumerate() {
        let op = [j, o];
        let machine = usize::try_from(machine)
          .ok()
          .filter(|&m| m < n_machines)
          .ok_or(ValidationError::MachineOutOfRange {
            op: op,
            machine: machine,
            n_machines: n_machines,
          })?;
        if duration <= 0 {
          return Err(ValidationError::NonPositiveDuration {
            op: op,
            duration: duration,
          });
        }
        let duration =
          Duration::try_from(duration).map_err(|_| ValidationError::DurationTooLarge { op: op })?;
        if seen[machine] {
          return Err(ValidationError::DuplicateMachine {
            job: j,
            machine: machine,
          });
        }
        seen[machine] = true;
        horizon += duration as u64;

        operations.push(Operation {
          machine: machine,
          duration: duration,
        });
      }

      jobs.push(Job {
        operations: operations,
      });
    }

    // Semi-active end times never exceed the sum of all durations
    if horizon > Time::MAX as u64 {
      return Err(ValidationError::HorizonTooLarge { horizon: horizon });
    }

    return Ok(Instance::from_jobs(name.into(), n_machines, jobs, bks));
  }

  fn from_jobs(name: String, n_machines: usize, jobs: Vec<Job>, bks: Option<u32>) -> Instance {
    let mut job_offsets = Vec::with_capacity(jobs.len() + 1);
    let mut offset = 0;
    for job in &jobs {
      job_offsets.push(offset);
      offset += job.n_operations();
    }
    job_offsets.push(offset);
    let n_ops = offset;

    let mut durations = Array1::<Duration>::from_elem(n_ops, 0);
    let mut machines = Array1::<Machine>::from_elem(n_ops, 0);
    let mut jobs_of_ops = Array1::<usize>::from_elem(n_ops, 0);
    let mut machine_ops = vec![Vec::new(); n_machines];
    for (j, job) in jobs.iter().enumerate() {
      for (o, operation) in job.operations.iter().enumerate() {
        let id = job_offsets[j] + o;
        durations[id] = operation.duration;
        machines[id] = operation.machine;
        jobs_of_ops[id] = j;
        machine_ops[operation.machine].push(id);
      }
    }

    Instance {
      name: name,
      n_jobs: jobs.len(),
      n_machines: n_machines,
      bks: bks,
      jobs: jobs,
      job_offsets: job_offsets,
      durations: durations,
      machines: machines,
      jobs_of_ops: jobs_of_ops,
      machine_ops: machine_ops,
    }
  }

  pub fn name(&self) -> &str {
    return &self.name;
  }

  pub fn n_jobs(&self) -> usize {
    return self.n_jobs;
  }

  pub fn n_machines(&self) -> usize {
    return self.n_machines;
  }

  pub fn n_ops(&self) -> usize {
    return self.durations.len();
  }

  pub fn bks(&self) -> Option<u32> {
    return self.bks;
  }

  pub fn jobs(&self) -> &[Job] {
    return &self.jobs;
  }

  pub fn job(&self, job: usize) -> &Job {
    return &self.jobs[job];
  }

  pub fn op_ids(&self) -> std::ops::Range<OpId> {
    return 0..self.n_ops();
  }

  pub fn op_to_id(&self, op: Op) -> OpId {
    let [j, o] = op;
    debug_assert!(o < self.jobs[j].n_operations());
    return self.job_offsets[j] + o;
  }

  /// Like [`op_to_id`](Instance::op_to_id) but checks that the operation exists.
  pub fn checked_op_to_id(&self, op: Op) -> Option<OpId> {
    let [j, o] = op;
    let job = self.jobs.get(j)?;
    if o < job.n_operations() {
      Some(self.job_offsets[j] + o)
    } else {
      None
    }
  }

  pub fn op_from_id(&self, id: OpId) -> Op {
    let j = self.jobs_of_ops[id];
    return [j, id - self.job_offsets[j]];
  }

  pub fn job_of(&self, id: OpId) -> usize {
    return self.jobs_of_ops[id];
  }

  pub fn duration(&self, id: OpId) -> Duration {
    return self.durations[id];
  }

  pub fn machine(&self, id: OpId) -> Machine {
    return self.machines[id];
  }

  pub fn durations(&self) -> &Array1<Duration> {
    return &self.durations;
  }

  pub fn machines(&self) -> &Array1<Machine> {
    return &self.machines;
  }

  pub fn pre_job(&self, id: OpId) -> Option<OpId> {
    let j = self.jobs_of_ops[id];
    if id > self.job_offsets[j] {
      Some(id - 1)
    } else {
      None
    }
  }

  pub fn succ_job(&self, id: OpId) -> Option<OpId> {
    let j = self.jobs_of_ops[id];
    if id + 1 < self.job_offsets[j + 1] {
      Some(id + 1)
    } else {
      None
    }
  }

  /// Operations processed by `machine`, in job order.
  pub fn machine_ops(&self, machine: Machine) -> &[OpId] {
    return &self.machine_ops[machine];
  }

  pub fn job_total_duration(&self, job: usize) -> Duration {
    return self.jobs[job].total_duration();
  }

  pub fn machine_total_duration(&self, machine: Machine) -> Duration {
    return self.machine_ops[machine]
      .iter()
      .map(|&op| self.durations[op])
      .sum();
  }

  /// Neither the longest job nor the busiest machine can finish earlier than its own workload.
  pub fn lower_bound(&self) -> Time {
    let longest_job = (0..self.n_jobs)
      .map(|j| self.job_total_duration(j))
      .max()
      .unwrap_or(0);
    let busiest_machine = (0..self.n_machines)
      .map(|m| self.machine_total_duration(m))
      .max()
      .unwrap_or(0);
    return cmp::max(longest_job, busiest_machine);
  }

  /// Relative distance of `makespan` to the best known solution, in percent.
  pub fn gap_percent(&self, makespan: Time) -> Option<f64> {
    return self
      .bks
      .filter(|&bks| bks > 0)
      .map(|bks| (makespan as f64 - bks as f64) / bks as f64 * 100.0);
  }
}

/// One processing order per machine, listing that machine's operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SolutionCandidate {
  machine_orders: Vec<Vec<OpId>>,
}

impl SolutionCandidate {
  pub fn new(machine_orders: Vec<Vec<OpId>>) -> Self {
    SolutionCandidate {
      machine_orders: machine_orders,
    }
  }

  /// Builds a candidate from `[job, operation index]` pairs per machine.
  pub fn from_ops(inst: &Instance, orders: &[Vec<Op>]) -> Result<Self, InfeasibleOrderingError> {
    let mut machine_orders = Vec::with_capacity(orders.len());
    for order in orders {
      let mut ids = Vec::with_capacity(order.len());
      for &op in order {
        let id = inst
          .checked_op_to_id(op)
          .ok_or(InfeasibleOrderingError::UnknownOperation { op: op })?;
        ids.push(id);
      }
      machine_orders.push(ids);
    }

    return Ok(SolutionCandidate::new(machine_orders));
  }

  pub fn machine_orders(&self) -> &[Vec<OpId>] {
    return &self.machine_orders;
  }

  pub fn machine_order(&self, machine: Machine) -> &[OpId] {
    return &self.machine_orders[machine];
  }

  pub(crate) fn machine_order_mut(&mut self, machine: Machine) -> &mut Vec<OpId> {
    return &mut self.machine_orders[machine];
  }

  pub fn to_ops(&self, inst: &Instance) -> Vec<Vec<Op>> {
    return self
      .machine_orders
      .iter()
      .map(|order| order.iter().map(|&id| inst.op_from_id(id)).collect())
      .collect();
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTime {
  pub start: Time,
  pub end: Time,
  pub machine: Machine,
}

/// Timed schedule. Only produced by the evaluator or by checking externally supplied start times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
  times: Vec<Vec<OperationTime>>,
  makespan: Time,
  candidate: SolutionCandidate,
}

impl Schedule {
  pub(crate) fn from_release_times(
    inst: &Instance,
    release_times: &Array1<Time>,
    candidate: SolutionCandidate,
  ) -> Schedule {
    let mut times = Vec::with_capacity(inst.n_jobs());
    let mut makespan = 0;
    for (j, job) in inst.jobs().iter().enumerate() {
      let mut job_times = Vec::with_capacity(job.n_operations());
      for o in 0..job.n_operations() {
        let id = inst.op_to_id([j, o]);
        let start = release_times[id];
        let end = start + inst.duration(id);
        makespan = cmp::max(makespan, end);
        job_times.push(OperationTime {
          start: start,
          end: end,
          machine: inst.machine(id),
        });
      }
      times.push(job_times);
    }

    Schedule {
      times: times,
      makespan: makespan,
      candidate: candidate,
    }
  }

  /// Accepts start times computed elsewhere (e.g. by an external solver) after
  /// checking them against the precedence and machine constraints.
  ///
  /// The start times are kept as given, so the result need not be semi-active.
  pub fn from_start_times(
    inst: &Instance,
    start_times: &[Vec<Time>],
  ) -> Result<Schedule, InfeasibleOrderingError> {
    let shape_matches = start_times.len() == inst.n_jobs()
      && start_times
        .iter()
        .zip(inst.jobs())
        .all(|(starts, job)| starts.len() == job.n_operations());
    if !shape_matches {
      let given: usize = start_times.iter().map(|starts| starts.len()).sum();
      return Err(InfeasibleOrderingError::MissingOperations {
        missing: inst.n_ops().saturating_sub(given),
      });
    }

    let mut release_times = Array1::<Time>::from_elem(inst.n_ops(), 0);
    for (j, starts) in start_times.iter().enumerate() {
      for (o, &start) in starts.iter().enumerate() {
        release_times[inst.op_to_id([j, o])] = start;
      }
    }

    crate::solver::verify_release_times(inst, &release_times)?;
    let candidate = crate::solver::get_orientation_from_release_times(inst, &release_times);

    return Ok(Schedule::from_release_times(inst, &release_times, candidate));
  }

  pub fn makespan(&self) -> Time {
    return self.makespan;
  }

  /// Times indexed by job, then operation index.
  pub fn times(&self) -> &[Vec<OperationTime>] {
    return &self.times;
  }

  pub fn get(&self, op: Op) -> Option<&OperationTime> {
    let [j, o] = op;
    return self.times.get(j).and_then(|job| job.get(o));
  }

  pub fn candidate(&self) -> &SolutionCandidate {
    return &self.candidate;
  }

  pub fn into_candidate(self) -> SolutionCandidate {
    return self.candidate;
  }

  pub fn start_times(&self) -> Vec<Vec<Time>> {
    return self
      .times
      .iter()
      .map(|job| job.iter().map(|t| t.start).collect())
      .collect();
  }

  /// Busy time of each machine divided by the makespan.
  pub fn machine_utilization(&self, inst: &Instance) -> Vec<f64> {
    let mut busy = vec![0; inst.n_machines()];
    for t in self.times.iter().flatten() {
      busy[t.machine] += t.end - t.start;
    }

    return busy
      .into_iter()
      .map(|b| {
        if self.makespan == 0 {
          0.0
        } else {
          b as f64 / self.makespan as f64
        }
      })
      .collect();
  }
}

#[cfg(test)]
pub(crate) mod test {
  use super::*;

  /// Three jobs on three machines, optimal makespan 7.
  pub fn ft03() -> Instance {
    Instance::new(
      "ft03",
      3,
      3,
      vec![
        vec![(0, 3), (1, 2), (2, 2)],
        vec![(1, 2), (2, 1), (0, 1)],
        vec![(2, 3), (0, 1), (1, 2)],
      ],
      Some(7),
    )
    .unwrap()
  }

  #[test]
  fn test_derived_arrays() {
    let inst = ft03();
    assert_eq!(inst.n_ops(), 9);
    assert_eq!(inst.op_to_id([1, 2]), 5);
    assert_eq!(inst.op_from_id(5), [1, 2]);
    assert_eq!(inst.machine(5), 0);
    assert_eq!(inst.duration(6), 3);
    assert_eq!(inst.machine_ops(0), &[0, 5, 7]);
    assert_eq!(inst.pre_job(3), None);
    assert_eq!(inst.pre_job(4), Some(3));
    assert_eq!(inst.succ_job(5), None);
    assert_eq!(inst.checked_op_to_id([2, 3]), None);
  }

  #[test]
  fn test_lower_bound() {
    let inst = ft03();
    // Job 0 needs 7, machine 0 needs 5
    assert_eq!(inst.lower_bound(), 7);
    assert_eq!(inst.gap_percent(7), Some(0.0));
    assert_eq!(inst.gap_percent(14), Some(100.0));
  }

  #[test]
  fn test_rejects_duplicate_machine() {
    let err = Instance::new("dup", 1, 2, vec![vec![(0, 1), (0, 2)]], None).unwrap_err();
    assert_eq!(err, ValidationError::DuplicateMachine { job: 0, machine: 0 });
  }

  #[test]
  fn test_rejects_bad_input() {
    assert_eq!(
      Instance::new("bad", 1, 2, vec![vec![(2, 1)]], None).unwrap_err(),
      ValidationError::MachineOutOfRange {
        op: [0, 0],
        machine: 2,
        n_machines: 2
      }
    );
    assert_eq!(
      Instance::new("bad", 1, 2, vec![vec![(-1, 1)]], None).unwrap_err(),
      ValidationError::MachineOutOfRange {
        op: [0, 0],
        machine: -1,
        n_machines: 2
      }
    );
    assert_eq!(
      Instance::new("bad", 1, 2, vec![vec![(1, 0)]], None).unwrap_err(),
      ValidationError::NonPositiveDuration {
        op: [0, 0],
        duration: 0
      }
    );
    assert_eq!(
      Instance::new("bad", 0, 2, vec![], None).unwrap_err(),
      ValidationError::NoJobs
    );
    assert_eq!(
      Instance::new("bad", 2, 2, vec![vec![(0, 1)], vec![]], None).unwrap_err(),
      ValidationError::EmptyJob { job: 1 }
    );
    assert_eq!(
      Instance::new("bad", 3, 2, vec![vec![(0, 1)]], None).unwrap_err(),
      ValidationError::JobCountMismatch {
        expected: 3,
        found: 1
      }
    );
    assert_eq!(
      Instance::new("bad", 1, 0, vec![vec![(0, 1)]], None).unwrap_err(),
      ValidationError::NoMachines
    );
  }

  #[test]
  fn test_rejects_horizon_overflow() {
    let long = 3_000_000_000;
    assert_eq!(
      Instance::new("big", 2, 1, vec![vec![(0, long)], vec![(0, long)]], None).unwrap_err(),
      ValidationError::HorizonTooLarge {
        horizon: 6_000_000_000
      }
    );

    let inst = Instance::new("fits", 1, 1, vec![vec![(0, Time::MAX as i64)]], None).unwrap();
    assert_eq!(inst.lower_bound(), Time::MAX);
  }

  #[test]
  fn test_schedule_from_start_times_rejects_overflow() {
    let inst = Instance::new("chain", 1, 2, vec![vec![(0, 5), (1, 1)]], None).unwrap();

    let err = Schedule::from_start_times(&inst, &[vec![Time::MAX - 1, 10]]).unwrap_err();
    assert_eq!(
      err,
      InfeasibleOrderingError::TimeOverflow {
        op: [0, 0],
        start: Time::MAX - 1
      }
    );
  }

  #[test]
  fn test_schedule_from_start_times() {
    let inst = Instance::new("pair", 2, 1, vec![vec![(0, 2)], vec![(0, 3)]], None).unwrap();

    let schedule = Schedule::from_start_times(&inst, &[vec![3], vec![0]]).unwrap();
    assert_eq!(schedule.makespan(), 5);
    assert_eq!(schedule.candidate().machine_order(0), &[1, 0]);
    assert_eq!(schedule.machine_utilization(&inst), vec![1.0]);

    let err = Schedule::from_start_times(&inst, &[vec![0], vec![1]]).unwrap_err();
    assert_eq!(
      err,
      InfeasibleOrderingError::Overlap {
        first: [0, 0],
        second: [1, 0],
        machine: 0
      }
    );
  }
}
