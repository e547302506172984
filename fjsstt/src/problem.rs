use std::{
    fmt::{Display, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use hashbrown::HashMap;
use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::{config::Config, matrix::TravelTimes, subproblem::SubproblemInstance};

pub type JobId = usize;
pub type MachineId = usize;
pub type TimeSlot = usize;

/// Objective of a single job, evaluated on its last operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    CompletionTime,
    #[default]
    Tardiness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProblemId(pub u64);

impl ProblemId {
    /// Hands out process-wide unique ids.
    pub fn generate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for ProblemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "problem-{}", self.0)
    }
}

/// A job with its operations. `process_times[op][machine]` is zero exactly when
/// `machine` is not among the alternatives of `op`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    process_times: Vec<Vec<u32>>,
    alt_machines: Vec<Vec<MachineId>>,
    due_date: i64,
    release_time: u32,
    weight: u32,
}

impl Job {
    /// Builds a job from a dense `operation x machine` process time table.
    pub fn new(process_times: Vec<Vec<u32>>, due_date: i64, weight: u32) -> Self {
        let alt_machines = process_times
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, time)| **time > 0)
                    .map(|(machine, _)| machine)
                    .collect()
            })
            .collect();

        Self {
            process_times,
            alt_machines,
            due_date,
            release_time: 0,
            weight,
        }
    }

    /// Builds a job from `(machine, process time)` alternatives per operation,
    /// keeping the alternatives in the given order.
    pub fn from_alternatives(
        alternatives: &[Vec<(MachineId, u32)>],
        machines: usize,
        due_date: i64,
        weight: u32,
    ) -> Self {
        let mut process_times = vec![vec![0; machines]; alternatives.len()];
        let mut alt_machines = Vec::with_capacity(alternatives.len());

        for (op, operation) in alternatives.iter().enumerate() {
            let mut machines_of_op = Vec::with_capacity(operation.len());
            for &(machine, time) in operation {
                process_times[op][machine] = time;
                machines_of_op.push(machine);
            }
            alt_machines.push(machines_of_op);
        }

        Self {
            process_times,
            alt_machines,
            due_date,
            release_time: 0,
            weight,
        }
    }

    pub fn with_release_time(mut self, release_time: u32) -> Self {
        self.release_time = release_time;
        self
    }

    pub fn operations(&self) -> usize {
        self.process_times.len()
    }

    pub fn process_times(&self) -> &[Vec<u32>] {
        &self.process_times
    }

    pub fn process_time(&self, op: usize, machine: MachineId) -> u32 {
        self.process_times[op][machine]
    }

    pub fn alt_machines(&self) -> &[Vec<MachineId>] {
        &self.alt_machines
    }

    pub fn due_date(&self) -> i64 {
        self.due_date
    }

    pub fn set_due_date(&mut self, due_date: i64) {
        self.due_date = due_date;
    }

    pub fn release_time(&self) -> u32 {
        self.release_time
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }
}

/// A flexible job shop instance with transport times between machines.
#[derive(Debug)]
pub struct Problem {
    id: ProblemId,
    machines: usize,
    time_slots: usize,
    jobs: HashMap<JobId, Job>,
    next_job_id: JobId,
    max_operations: usize,
    travel_times: Arc<TravelTimes>,
    objective: Objective,
    config: Config,
}

impl Problem {
    /// Jobs get the ids `0..jobs.len()`. Travel times that are missing or do not
    /// match `machines` are replaced by zeros.
    pub fn new(
        machines: usize,
        time_slots: usize,
        jobs: Vec<Job>,
        travel_times: Option<TravelTimes>,
        objective: Objective,
    ) -> Self {
        let next_job_id = jobs.len();
        let max_operations = jobs.iter().map(Job::operations).max().unwrap_or(0);
        let jobs: HashMap<JobId, Job> = jobs.into_iter().enumerate().collect();

        Self {
            id: ProblemId::generate(),
            machines,
            time_slots,
            jobs,
            next_job_id,
            max_operations,
            travel_times: Arc::new(Self::checked_travel_times(machines, travel_times)),
            objective,
            config: Config::default(),
        }
    }

    fn checked_travel_times(machines: usize, travel_times: Option<TravelTimes>) -> TravelTimes {
        match travel_times {
            Some(times) if times.rows() == machines && times.cols() == machines => times,
            Some(times) => {
                warn!(
                    "travel times are {}x{} but there are {machines} machines, using zeros",
                    times.rows(),
                    times.cols()
                );
                TravelTimes::new(machines, machines)
            }
            None => TravelTimes::new(machines, machines),
        }
    }

    pub fn id(&self) -> ProblemId {
        self.id
    }

    pub fn set_id(&mut self, id: ProblemId) {
        self.id = id;
    }

    pub fn machines(&self) -> usize {
        self.machines
    }

    pub fn time_slots(&self) -> usize {
        self.time_slots
    }

    pub fn set_time_slots(&mut self, time_slots: usize) {
        self.time_slots = time_slots;
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = objective;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn travel_times(&self) -> &Arc<TravelTimes> {
        &self.travel_times
    }

    pub fn travel_time(&self, from: MachineId, to: MachineId) -> u32 {
        self.travel_times[(from, to)]
    }

    /// Replaces the travel times. Subproblems created earlier keep the old matrix.
    pub fn set_travel_times(&mut self, travel_times: TravelTimes) {
        self.travel_times = Arc::new(Self::checked_travel_times(
            self.machines,
            Some(travel_times),
        ));
    }

    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub fn job_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&job_id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = (JobId, &Job)> {
        self.jobs.iter().map(|(id, job)| (*id, job))
    }

    /// Ids of all jobs in ascending order.
    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.jobs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn max_operations(&self) -> usize {
        self.max_operations
    }

    /// The id the next [`Problem::add_job`] will hand out.
    pub fn next_job_id(&self) -> JobId {
        self.next_job_id
    }

    pub fn alt_machines(&self, job_id: JobId) -> Option<&[Vec<MachineId>]> {
        self.jobs.get(&job_id).map(Job::alt_machines)
    }

    pub fn add_job(&mut self, job: Job) -> JobId {
        let id = self.next_job_id;
        self.next_job_id += 1;
        self.max_operations = self.max_operations.max(job.operations());
        self.jobs.insert(id, job);

        debug!("{}: added job {id}", self.id);
        id
    }

    /// Copies job `job_id` of `source` into this problem under the same id.
    /// Returns false when `source` has no such job.
    pub fn restore_job(&mut self, job_id: JobId, source: &Problem) -> bool {
        let Some(job) = source.job(job_id) else {
            return false;
        };

        self.max_operations = self.max_operations.max(job.operations());
        self.next_job_id = self.next_job_id.max(job_id + 1);
        self.jobs.insert(job_id, job.clone());

        debug!("{}: restored job {job_id} from {}", self.id, source.id);
        true
    }

    /// Removes a job. Its id is never handed out again by [`Problem::add_job`].
    pub fn remove_job(&mut self, job_id: JobId) -> Option<Job> {
        let job = self.jobs.remove(&job_id)?;

        if job.operations() == self.max_operations {
            self.max_operations = self.jobs.values().map(Job::operations).max().unwrap_or(0);
            trace!("max operations rescanned: {}", self.max_operations);
        }

        debug!("{}: removed job {job_id}", self.id);
        Some(job)
    }

    /// Earliest completion slot of a job on an empty shop, including travel
    /// between consecutive machines. Returns `None` for unknown or empty jobs.
    pub fn calc_min_job_completion_time(&self, job_id: JobId) -> Option<i64> {
        let job = self.jobs.get(&job_id)?;
        let (first, rest) = job.alt_machines.split_first()?;

        // completion slot of the current operation per machine
        let mut completion: Vec<(MachineId, i64)> = first
            .iter()
            .map(|&machine| (machine, i64::from(job.process_times[0][machine]) - 1))
            .collect();

        for (index, machines) in rest.iter().enumerate() {
            let op = index + 1;
            completion = machines
                .iter()
                .filter_map(|&machine| {
                    completion
                        .iter()
                        .map(|&(previous, time)| {
                            time + i64::from(self.travel_times[(previous, machine)])
                        })
                        .min()
                        .map(|ready| (machine, ready + i64::from(job.process_times[op][machine])))
                })
                .collect();
        }

        completion.into_iter().map(|(_, time)| time).min()
    }

    /// Makespan lower bound: the longest job when every operation runs on its
    /// fastest machine, ignoring travel and machine sharing. `-1` without jobs.
    pub fn calc_lb_makespan_fjss(&self) -> i64 {
        self.jobs
            .values()
            .map(|job| {
                job.alt_machines
                    .iter()
                    .zip(&job.process_times)
                    .map(|(machines, times)| {
                        machines
                            .iter()
                            .map(|&machine| i64::from(times[machine]))
                            .min()
                            .unwrap_or(0)
                    })
                    .sum::<i64>()
                    - 1
            })
            .max()
            .unwrap_or(-1)
    }

    /// Slack per job, spread evenly over its operations.
    pub fn calc_average_max_slacks(&self) -> HashMap<JobId, i64> {
        self.jobs
            .iter()
            .filter_map(|(&id, job)| {
                let completion = self.calc_min_job_completion_time(id)?;
                let slack = (job.due_date - completion).max(0);
                Some((id, slack / job.operations() as i64))
            })
            .collect()
    }

    pub fn create_subproblem(&self, job_id: JobId) -> Option<SubproblemInstance> {
        let job = self.jobs.get(&job_id)?;

        Some(SubproblemInstance::new(
            job_id,
            job,
            self.machines,
            self.time_slots,
            Arc::clone(&self.travel_times),
            self.objective,
        ))
    }

    pub fn create_subproblems(&self) -> HashMap<JobId, SubproblemInstance> {
        self.jobs
            .keys()
            .filter_map(|&id| self.create_subproblem(id).map(|sub| (id, sub)))
            .collect()
    }

    /// Same as [`Problem::create_subproblems`], one job per rayon task.
    pub fn create_subproblems_par(&self) -> HashMap<JobId, SubproblemInstance> {
        let ids: Vec<JobId> = self.jobs.keys().copied().collect();

        ids.into_par_iter()
            .filter_map(|id| self.create_subproblem(id).map(|sub| (id, sub)))
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }
}

impl Clone for Problem {
    /// Deep copy, including the travel times. The id is kept.
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            machines: self.machines,
            time_slots: self.time_slots,
            jobs: self.jobs.clone(),
            next_job_id: self.next_job_id,
            max_operations: self.max_operations,
            travel_times: Arc::new(TravelTimes::clone(&self.travel_times)),
            objective: self.objective,
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::matrix::TravelTimes;

    use super::{Job, Objective, Problem};

    /// Two jobs on two machines, one unit of travel between the machines.
    fn two_by_two() -> Problem {
        let jobs = vec![
            Job::from_alternatives(&[vec![(0, 3), (1, 5)], vec![(1, 2)]], 2, 10, 1),
            Job::from_alternatives(&[vec![(1, 4)], vec![(0, 2), (1, 1)]], 2, 6, 2),
        ];
        let travel = TravelTimes::from_rows(2, 2, &[vec![0, 1], vec![1, 0]]);

        Problem::new(2, 20, jobs, Some(travel), Objective::Tardiness)
    }

    #[test]
    fn min_completion_time_includes_travel() {
        let problem = two_by_two();

        // job 0: machine 0 finishes at 2, one slot of travel, two slots on machine 1
        assert_eq!(problem.calc_min_job_completion_time(0), Some(5));
        // job 1: stays on machine 1
        assert_eq!(problem.calc_min_job_completion_time(1), Some(4));
        assert_eq!(problem.calc_min_job_completion_time(7), None);
    }

    #[test]
    fn min_completion_time_ignores_due_date() {
        let mut problem = two_by_two();
        let before = problem.calc_min_job_completion_time(0);
        let slacks_before = problem.calc_average_max_slacks();

        problem.job_mut(0).unwrap().set_due_date(40);

        assert_eq!(problem.calc_min_job_completion_time(0), before);
        assert_ne!(problem.calc_average_max_slacks()[&0], slacks_before[&0]);
    }

    #[test]
    fn lower_bound_is_below_a_feasible_schedule() {
        let problem = two_by_two();

        // job 0: op 0 on m0 [0,2], op 1 on m1 [4,5]
        // job 1: op 0 on m1 [0,3], op 1 on m0 [5,6]
        let feasible_makespan = 6;

        assert_eq!(problem.calc_lb_makespan_fjss(), 4);
        assert!(problem.calc_lb_makespan_fjss() <= feasible_makespan);
    }

    #[test]
    fn average_max_slacks() {
        let problem = two_by_two();
        let slacks = problem.calc_average_max_slacks();

        // (10 - 5) / 2 and (6 - 4) / 2
        assert_eq!(slacks[&0], 2);
        assert_eq!(slacks[&1], 1);
    }

    #[test]
    fn job_ids_are_never_reused() {
        let mut problem = two_by_two();
        let added = problem.add_job(Job::from_alternatives(&[vec![(0, 1)]], 2, 3, 1));
        assert_eq!(added, 2);

        assert!(problem.remove_job(added).is_some());
        let next = problem.add_job(Job::from_alternatives(&[vec![(0, 1)]], 2, 3, 1));

        assert_ne!(next, added);
        assert_eq!(problem.job_ids(), vec![0, 1, 3]);
        assert!(problem.remove_job(added).is_none());
    }

    #[test]
    fn max_operations_follow_removal() {
        let mut problem = two_by_two();
        let long = problem.add_job(Job::from_alternatives(
            &[vec![(0, 1)], vec![(1, 1)], vec![(0, 1)]],
            2,
            9,
            1,
        ));
        assert_eq!(problem.max_operations(), 3);

        problem.remove_job(long);
        assert_eq!(problem.max_operations(), 2);

        problem.remove_job(0);
        problem.remove_job(1);
        assert_eq!(problem.max_operations(), 0);
        assert_eq!(problem.calc_lb_makespan_fjss(), -1);
    }

    #[test]
    fn restore_job_brings_an_id_back() {
        let original = two_by_two();
        let mut problem = original.clone();

        problem.remove_job(1);
        assert!(problem.restore_job(1, &original));
        assert_eq!(problem.job(1), original.job(1));
        assert!(!problem.restore_job(5, &original));
        assert_eq!(problem.next_job_id(), 2);
    }

    #[test]
    fn process_times_match_alternatives() {
        let job = Job::new(vec![vec![0, 4, 2], vec![1, 0, 0]], 5, 1);

        assert_eq!(job.alt_machines(), &[vec![1, 2], vec![0]]);
        assert_eq!(job.process_time(0, 1), 4);
        assert_eq!(job.process_time(1, 2), 0);
    }

    #[test]
    fn subproblems_share_travel_times() {
        let problem = two_by_two();
        let subproblems = problem.create_subproblems();

        assert_eq!(subproblems.len(), 2);
        for subproblem in subproblems.values() {
            assert!(Arc::ptr_eq(subproblem.travel_times(), problem.travel_times()));
        }

        let parallel = problem.create_subproblems_par();
        assert_eq!(parallel.len(), 2);
        assert_eq!(parallel[&1].process_times(), subproblems[&1].process_times());
        assert!(problem.create_subproblem(9).is_none());
    }

    #[test]
    fn clone_keeps_id_but_copies_travel_times() {
        let problem = two_by_two();
        let copy = problem.clone();

        assert_eq!(copy.id(), problem.id());
        assert!(!Arc::ptr_eq(copy.travel_times(), problem.travel_times()));
        assert_eq!(copy.travel_times(), problem.travel_times());
        assert_ne!(Problem::new(1, 1, vec![], None, Objective::Tardiness).id(), problem.id());
    }

    #[test]
    fn mismatching_travel_times_become_zero() {
        let mut problem = two_by_two();
        problem.set_travel_times(TravelTimes::new(3, 3));

        assert_eq!(problem.travel_times().rows(), 2);
        assert_eq!(problem.travel_time(0, 1), 0);
    }
}
