use std::sync::Arc;

use log::warn;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    bid::Bid,
    matrix::{Multipliers, TravelTimes},
    problem::{Job, JobId, MachineId, Objective, TimeSlot},
};

pub const DEFAULT_MULTIPLIER_SEED: u64 = 300;
pub const DEFAULT_MULTIPLIER_UPPER_BOUND: f64 = 5.0;

/// The single job scheduling problem of one job under fixed prices.
///
/// Everything but the multipliers and the timezone settings is a copy of the
/// job taken when the instance was created. The travel times are shared with
/// the [`Problem`](crate::problem::Problem) it came from.
#[derive(Debug, Clone)]
pub struct SubproblemInstance {
    job_id: JobId,
    operations: usize,
    machines: usize,
    time_slots: usize,
    alt_machines: Vec<Vec<MachineId>>,
    process_times: Vec<Vec<u32>>,
    travel_times: Arc<TravelTimes>,
    due_date: i64,
    weight: u32,
    objective: Objective,
    multipliers: Multipliers,
    timezone_length: usize,
    timezone_factor: f64,
}

impl SubproblemInstance {
    pub(crate) fn new(
        job_id: JobId,
        job: &Job,
        machines: usize,
        time_slots: usize,
        travel_times: Arc<TravelTimes>,
        objective: Objective,
    ) -> Self {
        Self {
            job_id,
            operations: job.operations(),
            machines,
            time_slots,
            alt_machines: job.alt_machines().to_vec(),
            process_times: job.process_times().to_vec(),
            travel_times,
            due_date: job.due_date(),
            weight: job.weight(),
            objective,
            multipliers: Multipliers::new(machines, time_slots),
            timezone_length: 0,
            timezone_factor: 0.0,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn operations(&self) -> usize {
        self.operations
    }

    pub fn machines(&self) -> usize {
        self.machines
    }

    pub fn time_slots(&self) -> usize {
        self.time_slots
    }

    pub fn alt_machines(&self) -> &[Vec<MachineId>] {
        &self.alt_machines
    }

    pub fn process_times(&self) -> &[Vec<u32>] {
        &self.process_times
    }

    pub fn travel_times(&self) -> &Arc<TravelTimes> {
        &self.travel_times
    }

    pub fn due_date(&self) -> i64 {
        self.due_date
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn multipliers(&self) -> &Multipliers {
        &self.multipliers
    }

    pub fn set_multipliers(&mut self, multipliers: Multipliers) {
        self.multipliers = multipliers;
    }

    pub fn timezone_length(&self) -> usize {
        self.timezone_length
    }

    pub fn set_timezone_length(&mut self, timezone_length: usize) {
        self.timezone_length = timezone_length;
    }

    pub fn timezone_factor(&self) -> f64 {
        self.timezone_factor
    }

    pub fn set_timezone_factor(&mut self, timezone_factor: f64) {
        self.timezone_factor = timezone_factor;
    }

    /// Prices of the slots the bid occupies plus the job objective. The
    /// multipliers are kept as the instance's own.
    ///
    /// # Panics
    ///
    /// If the bid assigns a machine that cannot run an operation or occupies
    /// slots beyond the horizon of `multipliers`.
    pub fn calc_cost(&mut self, objective: Objective, bid: &Bid, multipliers: &Multipliers) -> f64 {
        self.multipliers.clone_from(multipliers);

        self.utilisation_cost(bid) + self.last_operation_objective(objective, bid)
    }

    /// [`SubproblemInstance::calc_cost`] plus a quadratic penalty per operation:
    /// its process time is cut into zones of `timezone_length` slots and every
    /// zone adds its squared length times `timezone_factor`. A zero zone length
    /// disables the penalty.
    ///
    /// # Panics
    ///
    /// Same as [`SubproblemInstance::calc_cost`].
    pub fn calc_augmented_cost(
        &mut self,
        objective: Objective,
        bid: &Bid,
        multipliers: &Multipliers,
    ) -> f64 {
        self.multipliers.clone_from(multipliers);

        let mut cost = self.utilisation_cost(bid);

        if self.timezone_length > 0 {
            let length = self.timezone_length;
            for (op, &machine) in bid.optimum_machines().iter().enumerate().take(self.operations) {
                let process_time = self.process_times[op][machine] as usize;
                let full_zones = process_time / length;
                let last_zone = process_time % length;

                cost += (full_zones * length * length) as f64 * self.timezone_factor;
                cost += (last_zone * last_zone) as f64 * self.timezone_factor;
            }
        }

        cost + self.last_operation_objective(objective, bid)
    }

    fn utilisation_cost(&self, bid: &Bid) -> f64 {
        bid.optimum_machines()
            .iter()
            .zip(bid.optimum_begin_times())
            .enumerate()
            .take(self.operations)
            .map(|(op, (&machine, &begin))| {
                let end = begin + self.process_times[op][machine] as usize;
                (begin..end)
                    .map(|slot| self.multipliers[(machine, slot)])
                    .sum::<f64>()
            })
            .sum()
    }

    fn last_operation_objective(&self, objective: Objective, bid: &Bid) -> f64 {
        let last = self.operations - 1;
        self.calc_objective_value(
            objective,
            bid.optimum_begin_times()[last],
            bid.optimum_machines()[last],
        )
    }

    /// Objective of the job when its last operation starts at `begin` on `machine`.
    /// Tardiness without a due date degrades to the unweighted completion time.
    pub fn calc_objective_value(&self, objective: Objective, begin: TimeSlot, machine: MachineId) -> f64 {
        let last = self.operations - 1;
        let completion = begin as f64 + f64::from(self.process_times[last][machine]) - 1.0;

        match objective {
            Objective::CompletionTime => completion * f64::from(self.weight),
            Objective::Tardiness => {
                if self.due_date <= 0 {
                    warn!(
                        "job {}: tardiness objective without a due date, using the completion time",
                        self.job_id
                    );
                    return completion;
                }
                (completion - self.due_date as f64).max(0.0) * f64::from(self.weight)
            }
        }
    }

    /// Fills the multipliers with values from `(0, upper_bound]`, reproducible per seed.
    pub fn calc_random_multipliers(&mut self, seed: u64, upper_bound: f64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut multipliers = Multipliers::new(self.machines, self.time_slots);

        for value in multipliers.iter_mut() {
            *value = (1.0 - rng.gen::<f64>()) * upper_bound;
        }

        self.multipliers = multipliers;
    }

    pub fn calc_default_random_multipliers(&mut self) {
        self.calc_random_multipliers(DEFAULT_MULTIPLIER_SEED, DEFAULT_MULTIPLIER_UPPER_BOUND);
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bid::Bid,
        matrix::Multipliers,
        problem::{Job, Objective, Problem},
    };

    use super::SubproblemInstance;

    fn subproblem(due_date: i64, weight: u32) -> SubproblemInstance {
        let job = Job::from_alternatives(&[vec![(0, 2), (1, 3)], vec![(1, 5)]], 2, due_date, weight);
        let problem = Problem::new(2, 12, vec![job], None, Objective::Tardiness);
        problem.create_subproblem(0).unwrap()
    }

    fn prices() -> Multipliers {
        let mut multipliers = Multipliers::new(2, 12);
        for slot in 0..12 {
            multipliers[(0, slot)] = 1.0;
            multipliers[(1, slot)] = slot as f64;
        }
        multipliers
    }

    #[test]
    fn cost_is_utilisation_plus_objective() {
        let mut sub = subproblem(6, 2);
        let bid = Bid::new(0, 0.0, vec![0, 1], vec![0, 3]);

        // machine 0 slots 0..=1, machine 1 slots 3..=7, completion 7
        let utilisation = 2.0 + (3 + 4 + 5 + 6 + 7) as f64;
        let tardiness = (7.0 - 6.0) * 2.0;

        assert_eq!(sub.calc_cost(Objective::Tardiness, &bid, &prices()), utilisation + tardiness);
        assert_eq!(sub.multipliers(), &prices());
        assert_eq!(
            sub.calc_cost(Objective::CompletionTime, &bid, &prices()),
            utilisation + 14.0
        );
    }

    #[test]
    fn tardiness_without_due_date_is_completion() {
        let _ = env_logger::builder().is_test(true).try_init();
        let sub = subproblem(0, 3);

        assert_eq!(sub.calc_objective_value(Objective::Tardiness, 4, 1), 8.0);
        assert_eq!(sub.calc_objective_value(Objective::CompletionTime, 4, 1), 24.0);
        assert_eq!(subproblem(20, 3).calc_objective_value(Objective::Tardiness, 4, 1), 0.0);
    }

    #[test]
    fn augmented_cost_adds_zone_penalty() {
        let mut sub = subproblem(6, 2);
        let bid = Bid::new(0, 0.0, vec![0, 1], vec![0, 3]);
        let multipliers = Multipliers::new(2, 12);

        // no zones configured
        assert_eq!(sub.calc_augmented_cost(Objective::Tardiness, &bid, &multipliers), 2.0);

        sub.set_timezone_length(2);
        sub.set_timezone_factor(0.5);
        // op 0: 2 slots = one full zone (4), op 1: 5 slots = two full zones (8) + 1
        let penalty = (4.0 + 8.0 + 1.0) * 0.5;

        assert_eq!(
            sub.calc_augmented_cost(Objective::Tardiness, &bid, &multipliers),
            penalty + 2.0
        );
    }

    #[test]
    fn random_multipliers_are_reproducible() {
        let mut first = subproblem(6, 1);
        let mut second = subproblem(6, 1);

        first.calc_default_random_multipliers();
        second.calc_random_multipliers(300, 5.0);

        assert_eq!(first.multipliers(), second.multipliers());
        assert!(first.multipliers().iter().all(|value| *value > 0.0 && *value <= 5.0));

        second.calc_random_multipliers(301, 5.0);
        assert_ne!(first.multipliers(), second.multipliers());
    }

    #[test]
    fn instance_copies_the_job() {
        let sub = subproblem(6, 2);

        assert_eq!(sub.operations(), 2);
        assert_eq!(sub.alt_machines(), &[vec![0, 1], vec![1]]);
        assert_eq!(sub.process_times(), &[vec![2, 3], vec![0, 5]]);
        assert_eq!(sub.multipliers().rows(), 2);
        assert_eq!(sub.multipliers().cols(), 12);
        assert_eq!(sub.due_date(), 6);
    }
}
