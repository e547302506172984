use hashbrown::HashMap;
use log::trace;

use crate::{
    bid::Bid,
    matrix::{Multipliers, Subgradients},
    problem::{JobId, MachineId, Problem, TimeSlot},
};

/// How much of a [`Solution`] survives [`Solution::clone_with_depth`]. The
/// schedule itself is always copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CloneDepth {
    Full,
    WithoutBids,
    WithoutSubgradients,
    ScheduleOnly,
}

impl From<u8> for CloneDepth {
    fn from(depth: u8) -> Self {
        match depth {
            0 => CloneDepth::Full,
            1 => CloneDepth::WithoutBids,
            2 => CloneDepth::WithoutSubgradients,
            _ => CloneDepth::ScheduleOnly,
        }
    }
}

/// A schedule of all jobs: begin time and machine per operation, keyed by job.
///
/// Per job vectors grow on demand, so jobs may hold different numbers of
/// operations.
#[derive(Debug, Clone)]
pub struct Solution {
    objective_value: f64,
    iteration: usize,
    begin_times: HashMap<JobId, Vec<TimeSlot>>,
    machine_assignments: HashMap<JobId, Vec<MachineId>>,
    subgradients: Option<Subgradients>,
    multipliers: Option<Multipliers>,
    bids: HashMap<JobId, Bid>,
    max_operations_per_job: usize,
    next_job_id: JobId,
}

impl Solution {
    /// An empty schedule with zero multipliers and an objective of negative infinity.
    pub fn new(machines: usize, time_slots: usize, max_operations_per_job: usize) -> Self {
        Self {
            objective_value: f64::NEG_INFINITY,
            iteration: 0,
            begin_times: HashMap::new(),
            machine_assignments: HashMap::new(),
            subgradients: None,
            multipliers: Some(Multipliers::new(machines, time_slots)),
            bids: HashMap::new(),
            max_operations_per_job,
            next_job_id: 0,
        }
    }

    /// Takes machine assignments and begin times from the bids, the bids are kept.
    pub fn from_bids(bids: HashMap<JobId, Bid>, iteration: usize) -> Self {
        let mut begin_times = HashMap::with_capacity(bids.len());
        let mut machine_assignments = HashMap::with_capacity(bids.len());

        for (&job, bid) in &bids {
            begin_times.insert(job, bid.optimum_begin_times().to_vec());
            machine_assignments.insert(job, bid.optimum_machines().to_vec());
        }

        trace!("solution of iteration {iteration} built from {} bids", bids.len());

        let mut solution = Self::from_schedule(
            f64::NEG_INFINITY,
            begin_times,
            machine_assignments,
            iteration,
        );
        solution.bids = bids;
        solution
    }

    /// Wraps a complete schedule computed without bids.
    pub fn from_schedule(
        objective_value: f64,
        begin_times: HashMap<JobId, Vec<TimeSlot>>,
        machine_assignments: HashMap<JobId, Vec<MachineId>>,
        iteration: usize,
    ) -> Self {
        let max_operations_per_job = begin_times
            .values()
            .chain(machine_assignments.values())
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        let next_job_id = begin_times
            .keys()
            .chain(machine_assignments.keys())
            .map(|job| job + 1)
            .max()
            .unwrap_or(0);

        Self {
            objective_value,
            iteration,
            begin_times,
            machine_assignments,
            subgradients: None,
            multipliers: None,
            bids: HashMap::new(),
            max_operations_per_job,
            next_job_id,
        }
    }

    pub fn with_objective_value(mut self, objective_value: f64) -> Self {
        self.objective_value = objective_value;
        self
    }

    pub fn with_subgradients(mut self, subgradients: Subgradients) -> Self {
        self.subgradients = Some(subgradients);
        self
    }

    pub fn with_multipliers(mut self, multipliers: Multipliers) -> Self {
        self.multipliers = Some(multipliers);
        self
    }

    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    pub fn set_objective_value(&mut self, objective_value: f64) {
        self.objective_value = objective_value;
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn set_iteration(&mut self, iteration: usize) {
        self.iteration = iteration;
    }

    pub fn subgradients(&self) -> Option<&Subgradients> {
        self.subgradients.as_ref()
    }

    pub fn multipliers(&self) -> Option<&Multipliers> {
        self.multipliers.as_ref()
    }

    pub fn bids(&self) -> &HashMap<JobId, Bid> {
        &self.bids
    }

    pub fn bid(&self, job: JobId) -> Option<&Bid> {
        self.bids.get(&job)
    }

    pub fn max_operations_per_job(&self) -> usize {
        self.max_operations_per_job
    }

    pub fn begin_times(&self, job: JobId) -> Option<&[TimeSlot]> {
        self.begin_times.get(&job).map(Vec::as_slice)
    }

    pub fn machine_assignments(&self, job: JobId) -> Option<&[MachineId]> {
        self.machine_assignments.get(&job).map(Vec::as_slice)
    }

    /// Ids of all scheduled jobs in ascending order.
    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .begin_times
            .keys()
            .chain(self.machine_assignments.keys())
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn set_operation_begin_time(&mut self, job: JobId, op: usize, begin: TimeSlot) {
        Self::write_extending(&mut self.begin_times, job, op, begin);
        self.next_job_id = self.next_job_id.max(job + 1);
    }

    pub fn set_operation_machine_assignment(&mut self, job: JobId, op: usize, machine: MachineId) {
        Self::write_extending(&mut self.machine_assignments, job, op, machine);
        self.next_job_id = self.next_job_id.max(job + 1);
    }

    fn write_extending(map: &mut HashMap<JobId, Vec<usize>>, job: JobId, op: usize, value: usize) {
        let values = map.entry(job).or_default();
        if values.len() <= op {
            values.resize(op + 1, 0);
        }
        values[op] = value;
    }

    /// Adds an all-zero schedule for a new job. Ids of removed jobs are not reused.
    pub fn add_job(&mut self) -> JobId {
        let id = self.next_job_id;
        self.next_job_id += 1;
        self.begin_times
            .insert(id, vec![0; self.max_operations_per_job]);
        self.machine_assignments
            .insert(id, vec![0; self.max_operations_per_job]);
        id
    }

    /// Drops the schedule and the bid of a job. Returns false for unknown jobs.
    pub fn remove_job(&mut self, job: JobId) -> bool {
        let begin = self.begin_times.remove(&job).is_some();
        let machine = self.machine_assignments.remove(&job).is_some();
        let bid = self.bids.remove(&job).is_some();
        begin || machine || bid
    }

    /// Whether every job of `self` has the same machines and begin times in
    /// `other`. Jobs only `other` knows about are not looked at, nor are the
    /// objective, iteration, subgradients or multipliers.
    pub fn matches(&self, other: &Solution) -> bool {
        fn covers(mine: &HashMap<JobId, Vec<usize>>, theirs: &HashMap<JobId, Vec<usize>>) -> bool {
            mine.iter().all(|(job, values)| {
                theirs
                    .get(job)
                    .map_or(false, |other| other.get(..values.len()) == Some(values.as_slice()))
            })
        }

        covers(&self.machine_assignments, &other.machine_assignments)
            && covers(&self.begin_times, &other.begin_times)
    }

    pub fn clone_with_depth(&self, depth: impl Into<CloneDepth>) -> Self {
        let depth = depth.into();

        Self {
            objective_value: self.objective_value,
            iteration: self.iteration,
            begin_times: self.begin_times.clone(),
            machine_assignments: self.machine_assignments.clone(),
            subgradients: (depth < CloneDepth::WithoutSubgradients)
                .then(|| self.subgradients.clone())
                .flatten(),
            multipliers: (depth < CloneDepth::ScheduleOnly)
                .then(|| self.multipliers.clone())
                .flatten(),
            bids: if depth == CloneDepth::Full {
                self.bids.clone()
            } else {
                HashMap::new()
            },
            max_operations_per_job: self.max_operations_per_job,
            next_job_id: self.next_job_id,
        }
    }

    /// Completion slot of a job's last operation, `None` when the schedule
    /// does not cover it.
    pub fn completion_time(&self, job: JobId, problem: &Problem) -> Option<i64> {
        let last = problem.job(job)?.operations().checked_sub(1)?;
        let begin = *self.begin_times.get(&job)?.get(last)?;
        let machine = *self.machine_assignments.get(&job)?.get(last)?;
        let process_time = problem.job(job)?.process_times()[last].get(machine)?;

        Some(begin as i64 + i64::from(*process_time) - 1)
    }

    /// Latest completion over the jobs of `problem` this schedule covers.
    pub fn makespan(&self, problem: &Problem) -> Option<i64> {
        problem
            .job_ids()
            .into_iter()
            .filter_map(|job| self.completion_time(job, problem))
            .max()
    }
}

impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other) && other.matches(self)
    }
}
