use std::{fmt::Display, str::FromStr};

use fjs_parser::{parse_properties, structs::Properties, FjsParseError};
use hashbrown::HashMap;
use log::error;
use thiserror::Error;

use crate::problem::{JobId, Problem};

pub const SOLVER_TYPE_KEY: &str = "SubproblemSolver.type";
pub const EXECUTION_ITERATIONS_KEY: &str = "SubproblemSolver.Execution.Iterations";
pub const EXECUTION_TIME_KEY: &str = "SubproblemSolver.Execution.Time";
pub const MIN_MAX_SLACK_KEY: &str = "SubproblemSolver.MinMaxSlack";
pub const MAX_SHAKING_DISTANCE_KEY: &str = "SubproblemSolver.MaxShakingDistance";
pub const LS_ITERATIONS_KEY: &str = "SubproblemSolver.LS_iterations";
pub const MIN_MAX_SHIFT_DISTANCE_KEY: &str = "SubproblemSolver.MinMaxShiftDistance";
pub const LS_ALT_MACHINE_TRIES_KEY: &str = "SubproblemSolver.LS_altMachine_tries";
pub const NR_TIME_SLOTS_KEY: &str = "SubgradientSearch.NrTimeSlots";
pub const TRANSPORT_FILE_KEY: &str = "SubgradientSearch.TransportFile";

/// Result of a typed lookup: the configured value or the substituted default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValue<T> {
    Found(T),
    Fallback(T),
}

impl<T> ConfigValue<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, ConfigValue::Found(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            ConfigValue::Found(value) | ConfigValue::Fallback(value) => value,
        }
    }
}

/// Key/value settings of a run. Later duplicates of a key win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    entries: HashMap<String, String>,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, FjsParseError> {
        parse_properties(content).map(Self::from_properties)
    }

    pub fn from_properties(properties: Properties) -> Self {
        Self {
            entries: properties.entries.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Display) {
        self.entries.insert(key.into(), value.to_string());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The raw value of a key, empty values included.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Typed lookup. A missing, empty or unparsable value is reported and
    /// replaced by `default`, or by `T::default()` when none is given.
    /// `bool` only accepts `true` and `false` here, see [`Config::get_bool`].
    pub fn get<T: FromStr + Default>(&self, key: &str, default: Option<T>) -> ConfigValue<T> {
        let raw = self.raw(key).map(str::trim).filter(|raw| !raw.is_empty());

        match raw.map(|raw| (raw, raw.parse::<T>())) {
            Some((_, Ok(value))) => ConfigValue::Found(value),
            Some((raw, Err(_))) => Self::fallback(key, Some(raw), default),
            None => Self::fallback(key, None, default),
        }
    }

    /// Flag lookup: `true` in any letter case is true, every other value false.
    pub fn get_bool(&self, key: &str, default: Option<bool>) -> ConfigValue<bool> {
        match self.raw(key).map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => ConfigValue::Found(raw.eq_ignore_ascii_case("true")),
            None => Self::fallback(key, None, default),
        }
    }

    /// Shorthand for `get(key, default).into_inner()`.
    pub fn value<T: FromStr + Default>(&self, key: &str, default: Option<T>) -> T {
        self.get(key, default).into_inner()
    }

    fn fallback<T: Default>(key: &str, raw: Option<&str>, default: Option<T>) -> ConfigValue<T> {
        match raw {
            Some(raw) => error!("configuration value `{raw}` of `{key}` is invalid, using the default"),
            None => error!("configuration key `{key}` is not set, using the default"),
        }
        ConfigValue::Fallback(default.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubproblemSolverType {
    DynamicProgramming,
    #[default]
    VariableNeighbourhoodSearch,
}

#[derive(Debug, Error)]
#[error("unknown subproblem solver `{0}`")]
pub struct UnknownSolverType(pub String);

impl FromStr for SubproblemSolverType {
    type Err = UnknownSolverType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.contains("dynamicprogramming") || lower == "dp" {
            Ok(SubproblemSolverType::DynamicProgramming)
        } else if lower.contains("variableneighbourhoodsearch") || lower == "vns" {
            Ok(SubproblemSolverType::VariableNeighbourhoodSearch)
        } else {
            Err(UnknownSolverType(s.to_string()))
        }
    }
}

/// Settings handed to the per-job solvers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubproblemSolverConfig {
    pub solver_type: SubproblemSolverType,
    /// `-1` when unset.
    pub execution_iterations: i64,
    /// Seconds, `-1` when unset.
    pub execution_time: i64,
    pub max_shaking_distance: i64,
    pub ls_iterations: i64,
    pub ls_alt_machine_tries: i64,
    pub min_max_slack: i64,
    pub min_max_shift_distance: i64,
    max_slacks: HashMap<JobId, i64>,
    max_shift_distances: HashMap<JobId, i64>,
}

impl SubproblemSolverConfig {
    /// Built-in settings of a solver type.
    pub fn new(solver_type: SubproblemSolverType) -> Self {
        Self {
            solver_type,
            execution_iterations: 50,
            execution_time: 11,
            max_shaking_distance: 3,
            ls_iterations: 50,
            ls_alt_machine_tries: 1,
            min_max_slack: 10,
            min_max_shift_distance: 10,
            max_slacks: HashMap::new(),
            max_shift_distances: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let solver_type = config.value(SOLVER_TYPE_KEY, None);
        Self::from_config_with_type(solver_type, config)
    }

    pub fn from_config_with_type(solver_type: SubproblemSolverType, config: &Config) -> Self {
        Self {
            solver_type,
            execution_iterations: config.value(EXECUTION_ITERATIONS_KEY, Some(-1)),
            execution_time: config.value(EXECUTION_TIME_KEY, Some(-1)),
            max_shaking_distance: config.value(MAX_SHAKING_DISTANCE_KEY, None),
            ls_iterations: config.value(LS_ITERATIONS_KEY, None),
            ls_alt_machine_tries: config.value(LS_ALT_MACHINE_TRIES_KEY, None),
            min_max_slack: config.value(MIN_MAX_SLACK_KEY, None),
            min_max_shift_distance: config.value(MIN_MAX_SHIFT_DISTANCE_KEY, None),
            max_slacks: HashMap::new(),
            max_shift_distances: HashMap::new(),
        }
    }

    /// Job specific slacks, raised to at least `min_max_slack`.
    pub fn with_max_slacks(mut self, slacks: HashMap<JobId, i64>) -> Self {
        let min = self.min_max_slack;
        self.max_slacks = slacks
            .into_iter()
            .map(|(job, slack)| (job, slack.max(min)))
            .collect();
        self
    }

    /// Job specific shift distances, raised to at least `min_max_shift_distance`.
    pub fn with_max_shift_distances(mut self, distances: HashMap<JobId, i64>) -> Self {
        let min = self.min_max_shift_distance;
        self.max_shift_distances = distances
            .into_iter()
            .map(|(job, distance)| (job, distance.max(min)))
            .collect();
        self
    }

    /// Uses the average slack of every job of `problem`.
    pub fn with_problem_slacks(self, problem: &Problem) -> Self {
        self.with_max_slacks(problem.calc_average_max_slacks())
    }

    pub fn max_slack(&self, job: JobId) -> i64 {
        self.max_slacks
            .get(&job)
            .copied()
            .unwrap_or(self.min_max_slack)
    }

    pub fn max_shift_distance(&self, job: JobId) -> i64 {
        self.max_shift_distances
            .get(&job)
            .copied()
            .unwrap_or(self.min_max_shift_distance)
    }
}

impl Default for SubproblemSolverConfig {
    fn default() -> Self {
        Self::new(SubproblemSolverType::default())
    }
}

#[cfg(test)]
mod tests {
    use hashbrown::HashMap;

    use super::{
        Config, ConfigValue, SubproblemSolverConfig, SubproblemSolverType, LS_ITERATIONS_KEY,
        NR_TIME_SLOTS_KEY, SOLVER_TYPE_KEY,
    };

    static WT1A: &str = include_str!("../../fixtures/p1/WT1a.properties");
    static WT1B: &str = include_str!("../../fixtures/p1/WT1b.properties");

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn typed_lookup() {
        init();
        let config = Config::parse(WT1A).unwrap();

        assert_eq!(config.get::<usize>(NR_TIME_SLOTS_KEY, None), ConfigValue::Found(800));
        assert_eq!(
            config.get::<SubproblemSolverType>(SOLVER_TYPE_KEY, None),
            ConfigValue::Found(SubproblemSolverType::VariableNeighbourhoodSearch)
        );
        assert_eq!(config.get::<f64>("SimpleSearch.Alpha", None), ConfigValue::Found(2.0));
        assert_eq!(
            config.get::<bool>("SurrogateSearch.FixedInitialStepsize", None),
            ConfigValue::Found(true)
        );
    }

    #[test]
    fn missing_values_fall_back() {
        init();
        let mut config = Config::default();
        config.insert("empty", "");
        config.insert("text", "seven");

        assert_eq!(config.get::<i64>("absent", Some(4)), ConfigValue::Fallback(4));
        assert_eq!(config.get::<i64>("absent", None), ConfigValue::Fallback(0));
        assert_eq!(config.get::<String>("empty", None), ConfigValue::Fallback(String::new()));
        assert_eq!(config.get::<bool>("empty", None), ConfigValue::Fallback(false));
        assert_eq!(config.get::<u32>("text", Some(7)), ConfigValue::Fallback(7));
        assert!(!config.get::<u32>("text", None).is_found());
    }

    #[test]
    fn flags_ignore_letter_case() {
        init();
        let mut config = Config::default();
        config.insert("upper", "TRUE");
        config.insert("mixed", " True ");
        config.insert("other", "no");
        config.insert("empty", "");

        assert_eq!(config.get_bool("upper", None), ConfigValue::Found(true));
        assert_eq!(config.get_bool("mixed", None), ConfigValue::Found(true));
        assert_eq!(config.get_bool("other", Some(true)), ConfigValue::Found(false));
        assert_eq!(config.get_bool("empty", Some(true)), ConfigValue::Fallback(true));
        assert_eq!(config.get_bool("absent", None), ConfigValue::Fallback(false));
    }

    #[test]
    fn later_keys_override_earlier_ones() {
        let config = Config::parse("a=1\n! comment\nb : 2\na = 3\n").unwrap();

        assert_eq!(config.len(), 2);
        assert_eq!(config.value::<i32>("a", None), 3);
        assert_eq!(config.value::<i32>("b", None), 2);
    }

    #[test]
    fn solver_type_parsing() {
        assert_eq!(
            "DynamicProgramming".parse::<SubproblemSolverType>().unwrap(),
            SubproblemSolverType::DynamicProgramming
        );
        assert_eq!(
            "variableNeighbourhoodSearch".parse::<SubproblemSolverType>().unwrap(),
            SubproblemSolverType::VariableNeighbourhoodSearch
        );
        assert!("Simplex".parse::<SubproblemSolverType>().is_err());
    }

    #[test]
    fn solver_config_from_file() {
        init();
        let config = SubproblemSolverConfig::from_config(&Config::parse(WT1A).unwrap());

        assert_eq!(config.solver_type, SubproblemSolverType::VariableNeighbourhoodSearch);
        assert_eq!(config.execution_iterations, -1);
        assert_eq!(config.execution_time, -1);
        assert_eq!(config.ls_iterations, 150);
        assert_eq!(config.min_max_slack, 5);
        assert_eq!(config.max_shaking_distance, 3);
        assert_eq!(config.min_max_shift_distance, 50);
        assert_eq!(config.ls_alt_machine_tries, 1);

        let dp = SubproblemSolverConfig::from_config(&Config::parse(WT1B).unwrap());
        assert_eq!(dp.solver_type, SubproblemSolverType::DynamicProgramming);
        assert_eq!(dp.min_max_slack, 3);
    }

    #[test]
    fn job_slacks_are_clamped() {
        let config = SubproblemSolverConfig::new(SubproblemSolverType::DynamicProgramming)
            .with_max_slacks(HashMap::from([(0, 2), (1, 25)]));

        assert_eq!(config.max_slack(0), 10);
        assert_eq!(config.max_slack(1), 25);
        assert_eq!(config.max_slack(9), 10);
        assert_eq!(config.max_shift_distance(0), 10);
        assert_eq!(config.execution_iterations, 50);
        assert_eq!(config.execution_time, 11);
    }

    #[test]
    fn inserted_values_are_strings() {
        let mut config = Config::default();
        config.insert(LS_ITERATIONS_KEY, 12);

        assert_eq!(config.raw(LS_ITERATIONS_KEY), Some("12"));
        assert!(config.contains_key(LS_ITERATIONS_KEY));
    }
}
