use crate::problem::{JobId, MachineId, TimeSlot};

/// A solution of one subproblem: a machine and a begin time per operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    job_id: JobId,
    price: f64,
    optimum_machines: Vec<MachineId>,
    optimum_begin_times: Vec<TimeSlot>,
    occupied_time_slots: Vec<(MachineId, TimeSlot)>,
}

impl Bid {
    /// A bid without process times, its occupied slots stay empty.
    pub fn new(
        job_id: JobId,
        price: f64,
        optimum_machines: Vec<MachineId>,
        optimum_begin_times: Vec<TimeSlot>,
    ) -> Self {
        Self {
            job_id,
            price,
            optimum_machines,
            optimum_begin_times,
            occupied_time_slots: Vec::new(),
        }
    }

    /// A bid that also records every `(machine, slot)` its operations occupy.
    /// `process_times` is indexed `[operation][machine]`.
    pub fn with_process_times(
        job_id: JobId,
        price: f64,
        optimum_machines: Vec<MachineId>,
        optimum_begin_times: Vec<TimeSlot>,
        process_times: &[Vec<u32>],
    ) -> Self {
        let occupied_time_slots = optimum_machines
            .iter()
            .zip(&optimum_begin_times)
            .zip(process_times)
            .flat_map(|((&machine, &begin), times)| {
                let end = begin + times[machine] as usize;
                (begin..end).map(move |slot| (machine, slot))
            })
            .collect();

        Self {
            job_id,
            price,
            optimum_machines,
            optimum_begin_times,
            occupied_time_slots,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn optimum_machines(&self) -> &[MachineId] {
        &self.optimum_machines
    }

    pub fn optimum_begin_times(&self) -> &[TimeSlot] {
        &self.optimum_begin_times
    }

    pub fn occupied_time_slots(&self) -> &[(MachineId, TimeSlot)] {
        &self.occupied_time_slots
    }
}
