// Building a Problem from the three text resources of an instance.
//
// Only the problem file is mandatory. A configuration or transport file that
// cannot be found is reported and replaced by defaults, one that is found but
// malformed is an error.

use std::{
    fs,
    path::{Path, PathBuf},
};

use fjs_parser::{
    discovery::{
        check_or_find_file, find_files, CONFIG_FILE_EXTENSION, PROBLEM_FILE_EXTENSION,
        TRANSPORT_FILE_EXTENSION,
    },
    parse_problem, parse_transport_times,
    structs::{FjsProblem, TransportTimes},
    FjsParseError,
};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::{
    config::{Config, NR_TIME_SLOTS_KEY, TRANSPORT_FILE_KEY},
    matrix::TravelTimes,
    problem::{Job, Objective, Problem},
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no problem file found at {}", .0.display())]
    ProblemFileNotFound(PathBuf),
    #[error("cannot read {}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {}", .path.display())]
    Malformed {
        path: PathBuf,
        source: FjsParseError,
    },
}

impl Problem {
    /// Converts parsed file contents into the zero-based model: machines and
    /// due dates are shifted down by one. The horizon is the configured
    /// `SubgradientSearch.NrTimeSlots` or else the latest due date.
    pub fn from_parsed(
        raw: &FjsProblem,
        transport: Option<&TransportTimes>,
        config: Option<Config>,
    ) -> Problem {
        let machines = raw.machine_count;

        let jobs: Vec<Job> = raw
            .jobs
            .iter()
            .map(|job| {
                let alternatives: Vec<Vec<(usize, u32)>> = job
                    .operations
                    .iter()
                    .map(|operation| {
                        operation
                            .alternatives
                            .iter()
                            .map(|alt| (alt.machine - 1, alt.process_time))
                            .collect()
                    })
                    .collect();

                Job::from_alternatives(
                    &alternatives,
                    machines,
                    i64::from(job.due_date) - 1,
                    job.weight,
                )
                .with_release_time(job.release_time)
            })
            .collect();

        let latest_due_date = jobs.iter().map(Job::due_date).max().unwrap_or(0).max(0) as usize;
        let config = config.unwrap_or_default();
        let time_slots = if config.contains_key(NR_TIME_SLOTS_KEY) {
            config.value(NR_TIME_SLOTS_KEY, Some(latest_due_date))
        } else {
            latest_due_date
        };

        let travel_times =
            transport.map(|transport| TravelTimes::from_rows(machines, machines, &transport.times));

        let mut problem = Problem::new(
            machines,
            time_slots,
            jobs,
            travel_times,
            Objective::Tardiness,
        );
        problem.set_config(config);

        debug!(
            "{}: {} jobs, {machines} machines, {time_slots} time slots",
            problem.id(),
            problem.job_count()
        );
        problem
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn load_problem(path: &Path) -> Result<(PathBuf, FjsProblem), LoadError> {
    let file = check_or_find_file(path, PROBLEM_FILE_EXTENSION)
        .into_iter()
        .next()
        .ok_or_else(|| LoadError::ProblemFileNotFound(path.to_path_buf()))?;

    let raw = parse_problem(&read(&file)?).map_err(|source| LoadError::Malformed {
        path: file.clone(),
        source,
    })?;

    info!("loaded problem {}", file.display());
    Ok((file, raw))
}

fn load_config(file: Option<PathBuf>) -> Result<Option<Config>, LoadError> {
    let Some(file) = file else {
        return Ok(None);
    };

    let config = Config::parse(&read(&file)?).map_err(|source| LoadError::Malformed {
        path: file.clone(),
        source,
    })?;

    info!("loaded configuration {}", file.display());
    Ok(Some(config))
}

fn load_transport(
    file: Option<PathBuf>,
    machines: usize,
) -> Result<Option<TransportTimes>, LoadError> {
    let Some(file) = file else {
        return Ok(None);
    };

    let transport =
        parse_transport_times(&read(&file)?, machines).map_err(|source| LoadError::Malformed {
            path: file.clone(),
            source,
        })?;

    info!("loaded transport times {}", file.display());
    Ok(Some(transport))
}

fn first_or_warn(files: Vec<PathBuf>, path: &Path, what: &str) -> Option<PathBuf> {
    let first = files.into_iter().next();
    if first.is_none() {
        warn!("no {what} found for {}, using defaults", path.display());
    }
    first
}

/// The transport file named by the configuration, relative to the problem file.
fn configured_transport_file(config: &Config, problem_file: &Path) -> Option<PathBuf> {
    let name = config.raw(TRANSPORT_FILE_KEY)?.trim();
    if name.is_empty() {
        debug!("`{TRANSPORT_FILE_KEY}` is empty");
        return None;
    }

    let folder = problem_file.parent().unwrap_or_else(|| Path::new(""));
    let path = folder.join(name);
    first_or_warn(
        find_files(&path, TRANSPORT_FILE_EXTENSION),
        &path,
        "transport file",
    )
}

/// Transport via the configuration when there is one, a sibling of
/// `origin` otherwise.
fn discover_transport_file(
    config: Option<&Config>,
    problem_file: &Path,
    origin: &Path,
) -> Option<PathBuf> {
    match config {
        Some(config) => configured_transport_file(config, problem_file),
        None => first_or_warn(
            find_files(origin, TRANSPORT_FILE_EXTENSION),
            origin,
            "transport file",
        ),
    }
}

/// Loads the given files. Existing paths are used as named, whatever their
/// extension. Without an explicit transport file the one named in the
/// configuration is used.
pub fn parse_from_files(
    problem: &Path,
    config: Option<&Path>,
    transport: Option<&Path>,
) -> Result<Problem, LoadError> {
    let (problem_file, raw) = load_problem(problem)?;

    let config = load_config(config.and_then(|path| {
        first_or_warn(
            check_or_find_file(path, CONFIG_FILE_EXTENSION),
            path,
            "configuration",
        )
    }))?;

    let transport_file = match transport {
        Some(path) => first_or_warn(
            check_or_find_file(path, TRANSPORT_FILE_EXTENSION),
            path,
            "transport file",
        ),
        None => config
            .as_ref()
            .and_then(|config| configured_transport_file(config, &problem_file)),
    };
    let transport = load_transport(transport_file, raw.machine_count)?;

    Ok(Problem::from_parsed(&raw, transport.as_ref(), config))
}

/// Builds a problem from file contents. Never fails: errors are logged and
/// whatever could be parsed is used, an empty problem in the worst case.
pub fn parse_from_strings(problem: &str, config: Option<&str>, transport: Option<&str>) -> Problem {
    let raw = match parse_problem(problem) {
        Ok(raw) => raw,
        Err(err) => {
            error!("{err}");
            FjsProblem {
                job_count: 0,
                machine_count: 0,
                jobs: Vec::new(),
            }
        }
    };

    let config = config
        .filter(|content| !content.is_empty())
        .and_then(|content| match Config::parse(content) {
            Ok(config) => Some(config),
            Err(err) => {
                error!("{err}");
                None
            }
        });

    let transport = transport
        .filter(|content| !content.is_empty())
        .and_then(|content| match parse_transport_times(content, raw.machine_count) {
            Ok(transport) => Some(transport),
            Err(err) => {
                error!("{err}");
                None
            }
        });

    Problem::from_parsed(&raw, transport.as_ref(), config)
}

/// Loads just the problem file: no configuration, zero travel times.
pub fn parse_problem_file_only(problem: &Path) -> Result<Problem, LoadError> {
    let (_, raw) = load_problem(problem)?;
    Ok(Problem::from_parsed(&raw, None, None))
}

/// Loads a problem file together with the first configuration sharing its
/// name prefix and the transport file that configuration names.
pub fn parse_with_problem_file(problem: &Path) -> Result<Problem, LoadError> {
    let (problem_file, raw) = load_problem(problem)?;

    let config = load_config(first_or_warn(
        find_files(&problem_file, CONFIG_FILE_EXTENSION),
        &problem_file,
        "configuration",
    ))?;

    let transport_file = discover_transport_file(config.as_ref(), &problem_file, &problem_file);
    let transport = load_transport(transport_file, raw.machine_count)?;

    Ok(Problem::from_parsed(&raw, transport.as_ref(), config))
}

/// Loads a configuration file together with the first problem file sharing
/// its name prefix and the transport file it names.
pub fn parse_with_config_file(config: &Path) -> Result<Problem, LoadError> {
    let config_file = first_or_warn(
        check_or_find_file(config, CONFIG_FILE_EXTENSION),
        config,
        "configuration",
    );
    let config_loaded = load_config(config_file.clone())?;

    let origin = config_file.unwrap_or_else(|| config.to_path_buf());
    let problem_file = find_files(&origin, PROBLEM_FILE_EXTENSION)
        .into_iter()
        .next()
        .ok_or_else(|| LoadError::ProblemFileNotFound(origin.clone()))?;
    let (problem_file, raw) = load_problem(&problem_file)?;

    let transport_file = discover_transport_file(config_loaded.as_ref(), &problem_file, &origin);
    let transport = load_transport(transport_file, raw.machine_count)?;

    Ok(Problem::from_parsed(&raw, transport.as_ref(), config_loaded))
}
