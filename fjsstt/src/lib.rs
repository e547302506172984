pub mod bid;
pub mod config;
pub mod loading;
pub mod matrix;
pub mod problem;
pub mod solution;
pub mod subproblem;

pub use bid::Bid;
pub use config::{Config, SubproblemSolverConfig, SubproblemSolverType};
pub use loading::{
    parse_from_files, parse_from_strings, parse_problem_file_only, parse_with_config_file,
    parse_with_problem_file, LoadError,
};
pub use problem::{Job, JobId, MachineId, Objective, Problem, ProblemId, TimeSlot};
pub use solution::{CloneDepth, Solution};
pub use subproblem::SubproblemInstance;
