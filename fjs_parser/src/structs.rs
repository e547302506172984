/// Contents of a problem (`.fjs`) file, values as written in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FjsProblem {
    pub job_count: usize,
    pub machine_count: usize,
    pub jobs: Vec<FjsJob>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FjsJob {
    pub operations: Vec<FjsOperation>,
    pub release_time: u32,
    /// One-based time point, as written in the file.
    pub due_date: u32,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FjsOperation {
    pub alternatives: Vec<FjsAlternative>,
}

/// One `(machine, process time)` tuple of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FjsAlternative {
    /// One-based machine number, as written in the file.
    pub machine: usize,
    pub process_time: u32,
}

/// Travel times between machines, always `machines x machines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportTimes {
    pub times: Vec<Vec<u32>>,
    /// Number of rows actually present in the input.
    pub rows_read: usize,
}

impl TransportTimes {
    /// All-zero travel times, used when no transport file is available.
    pub fn zeros(machines: usize) -> Self {
        Self {
            times: vec![vec![0; machines]; machines],
            rows_read: 0,
        }
    }
}

/// `key=value` entries of a configuration file in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    pub entries: Vec<(String, String)>,
}
