// Line oriented grammars for the three text resources of an FJSSTT instance.
// Every line is run through a small chumsky parser, the cross-line structure
// (job count, tuple stream per operation) is checked afterwards.

use std::fmt::{Display, Formatter};

use chumsky::{prelude::*, Parser};
use log::{debug, trace, warn};
use structs::{FjsAlternative, FjsJob, FjsOperation, FjsProblem, Properties, TransportTimes};
use thiserror::Error;

pub mod discovery;
pub mod structs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Problem,
    Transport,
    Config,
}

impl Display for FileKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Problem => write!(f, "problem"),
            FileKind::Transport => write!(f, "transport"),
            FileKind::Config => write!(f, "configuration"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FjsParseError {
    #[error("malformed {file} file at line {line}: {}", describe(.errors))]
    Syntax {
        file: FileKind,
        line: usize,
        errors: Vec<Simple<char>>,
    },
    #[error("problem file is empty")]
    EmptyProblem,
    #[error("first line must hold the job and machine count, found {found:?}")]
    InvalidHeader { found: Vec<u32> },
    #[error("expected {expected} job lines, found {found}")]
    MissingJobLines { expected: usize, found: usize },
    #[error("line {line}: a job needs an operation count, release time, due date and weight")]
    MissingJobFields { line: usize },
    #[error("line {line}: job has no operations")]
    EmptyJob { line: usize },
    #[error("line {line}: operation {operation} is missing (machine, process time) tuples")]
    InsufficientTuples { line: usize, operation: usize },
    #[error("line {line}: operation {operation} has no alternative machines")]
    NoAlternativeMachines { line: usize, operation: usize },
    #[error("line {line}: operation {operation} uses machine {machine} but there are {machines} machines")]
    MachineOutOfRange {
        line: usize,
        operation: usize,
        machine: usize,
        machines: usize,
    },
    #[error("line {line}: operation {operation} lists machine {machine} twice")]
    DuplicateMachine {
        line: usize,
        operation: usize,
        machine: usize,
    },
    #[error("line {line}: operation {operation} has no process time on machine {machine}")]
    ZeroProcessTime {
        line: usize,
        operation: usize,
        machine: usize,
    },
}

fn describe(errors: &[Simple<char>]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses a problem file: `<jobs> <machines>` followed by one line per job.
pub fn parse_problem(content: &str) -> Result<FjsProblem, FjsParseError> {
    let line_parser = number_list(is_field_separator);

    let mut lines = content
        .lines()
        .enumerate()
        .map(|(index, text)| (index + 1, text))
        .filter(|(_, text)| !text.trim().is_empty());

    let (header_line, header) = lines.next().ok_or(FjsParseError::EmptyProblem)?;
    let header = parse_line(&line_parser, FileKind::Problem, header_line, header)?;
    if header.len() != 2 {
        return Err(FjsParseError::InvalidHeader { found: header });
    }
    let job_count = header[0] as usize;
    let machine_count = header[1] as usize;
    debug!("problem header: {job_count} jobs on {machine_count} machines");

    let mut jobs = Vec::with_capacity(job_count);
    for (line, text) in lines.by_ref().take(job_count) {
        let values = parse_line(&line_parser, FileKind::Problem, line, text)?;
        jobs.push(parse_job(line, &values, machine_count)?);
    }

    if jobs.len() < job_count {
        return Err(FjsParseError::MissingJobLines {
            expected: job_count,
            found: jobs.len(),
        });
    }

    let ignored = lines.count();
    if ignored > 0 {
        warn!("ignoring {ignored} lines after the last job");
    }

    Ok(FjsProblem {
        job_count,
        machine_count,
        jobs,
    })
}

/// Splits one job line into its operations. The tuple stream sits between the
/// operation count and the trailing `release due weight` triple and is consumed
/// greedily, operation by operation.
fn parse_job(line: usize, values: &[u32], machines: usize) -> Result<FjsJob, FjsParseError> {
    if values.len() < 4 {
        return Err(FjsParseError::MissingJobFields { line });
    }

    let (stream, trailer) = values.split_at(values.len() - 3);
    let (&operation_count, mut tuples) = stream
        .split_first()
        .ok_or(FjsParseError::MissingJobFields { line })?;

    if operation_count == 0 {
        return Err(FjsParseError::EmptyJob { line });
    }

    let mut operations = Vec::with_capacity(operation_count as usize);
    for operation in 0..operation_count as usize {
        let (&alternative_count, rest) = tuples
            .split_first()
            .ok_or(FjsParseError::InsufficientTuples { line, operation })?;

        if alternative_count == 0 {
            return Err(FjsParseError::NoAlternativeMachines { line, operation });
        }

        let needed = 2 * alternative_count as usize;
        if rest.len() < needed {
            return Err(FjsParseError::InsufficientTuples { line, operation });
        }
        let (pairs, remainder) = rest.split_at(needed);

        let mut alternatives: Vec<FjsAlternative> = Vec::with_capacity(alternative_count as usize);
        for pair in pairs.chunks_exact(2) {
            let machine = pair[0] as usize;
            let process_time = pair[1];

            if machine == 0 || machine > machines {
                return Err(FjsParseError::MachineOutOfRange {
                    line,
                    operation,
                    machine,
                    machines,
                });
            }
            if process_time == 0 {
                return Err(FjsParseError::ZeroProcessTime {
                    line,
                    operation,
                    machine,
                });
            }
            if alternatives.iter().any(|alt| alt.machine == machine) {
                return Err(FjsParseError::DuplicateMachine {
                    line,
                    operation,
                    machine,
                });
            }

            alternatives.push(FjsAlternative {
                machine,
                process_time,
            });
        }

        operations.push(FjsOperation { alternatives });
        tuples = remainder;
    }

    if !tuples.is_empty() {
        warn!(
            "line {line}: ignoring {} values after the last operation",
            tuples.len()
        );
    }

    trace!("line {line}: parsed {} operations", operations.len());

    Ok(FjsJob {
        operations,
        release_time: trailer[0],
        due_date: trailer[1],
        weight: trailer[2],
    })
}

/// Parses up to `machines` rows of travel times. Any non-digit separates two
/// values; rows or columns missing from the input stay zero.
pub fn parse_transport_times(
    content: &str,
    machines: usize,
) -> Result<TransportTimes, FjsParseError> {
    let line_parser = number_list(is_non_digit);
    let mut transport = TransportTimes::zeros(machines);

    for (index, text) in content.lines().take(machines).enumerate() {
        let values = parse_line(&line_parser, FileKind::Transport, index + 1, text)?;
        for (slot, value) in transport.times[index].iter_mut().zip(values) {
            *slot = value;
        }
        transport.rows_read += 1;
    }

    if transport.rows_read < machines {
        debug!(
            "transport times: read {} of {machines} rows, the rest stays zero",
            transport.rows_read
        );
    }

    Ok(transport)
}

/// Parses `key=value` lines. `#` and `!` start comments, blank lines are skipped.
pub fn parse_properties(content: &str) -> Result<Properties, FjsParseError> {
    let line_parser = property_line();
    let mut properties = Properties::default();

    for (index, text) in content.lines().enumerate() {
        if let Some(entry) = parse_line(&line_parser, FileKind::Config, index + 1, text)? {
            properties.entries.push(entry);
        }
    }

    debug!("parsed {} configuration entries", properties.entries.len());

    Ok(properties)
}

fn parse_line<O>(
    parser: &impl Parser<char, O, Error = Simple<char>>,
    file: FileKind,
    line: usize,
    text: &str,
) -> Result<O, FjsParseError> {
    parser
        .parse(text)
        .map_err(|errors| FjsParseError::Syntax { file, line, errors })
}

fn is_field_separator(c: &char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';')
}

fn is_non_digit(c: &char) -> bool {
    !c.is_ascii_digit()
}

pub(crate) fn number() -> impl Parser<char, u32, Error = Simple<char>> + Clone {
    filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .at_least(1)
        .collect::<String>()
        .try_map(|digits, span| {
            digits
                .parse::<u32>()
                .map_err(|err| Simple::custom(span, format!("{digits}: {err}")))
        })
        .labelled("number")
}

pub(crate) fn number_list(
    separator: fn(&char) -> bool,
) -> impl Parser<char, Vec<u32>, Error = Simple<char>> {
    number()
        .separated_by(filter(separator).repeated().at_least(1))
        .allow_leading()
        .allow_trailing()
        .then_ignore(end())
}

pub(crate) fn property_line() -> impl Parser<char, Option<(String, String)>, Error = Simple<char>>
{
    let comment = one_of("#!")
        .then(any().repeated())
        .to(None::<(String, String)>);

    let key = filter(|c: &char| *c != '=' && *c != ':')
        .repeated()
        .at_least(1)
        .collect::<String>();

    let value = one_of("=:").ignore_then(any().repeated().collect::<String>());

    let entry = key
        .then(value.or_not())
        .try_map(|(key, value): (String, Option<String>), span| {
            let key = key.trim();
            if key.is_empty() {
                return Err(Simple::custom(span, "property without a key"));
            }
            let value = value.as_deref().map(str::trim).unwrap_or_default();
            Ok(Some((key.to_string(), value.to_string())))
        });

    text::whitespace()
        .ignore_then(comment.or(entry).or_not())
        .map(Option::flatten)
        .then_ignore(end())
        .labelled("property")
}

#[cfg(test)]
mod tests {
    use chumsky::Parser;

    use crate::{parse_problem, parse_properties, parse_transport_times, FjsParseError};

    static WT1_PROBLEM: &str = include_str!("../../fixtures/p1/WT1.fjs");
    static WT1_TRANSPORT: &str = include_str!("../../fixtures/p1/WT1a.transport");
    static WT1_PROPERTIES: &str = include_str!("../../fixtures/p1/WT1a.properties");

    #[test]
    fn number_list_parsing() {
        let parser = crate::number_list(crate::is_field_separator);

        assert_eq!(parser.parse(" 6 2 2 3 ").unwrap(), vec![6, 2, 2, 3]);
        assert_eq!(parser.parse("1,2;3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parser.parse("").unwrap(), Vec::<u32>::new());
        assert!(parser.parse("1 2a").is_err());
        assert!(parser.parse("99999999999").is_err());
    }

    #[test]
    fn property_line_parsing() {
        let parser = crate::property_line();

        assert_eq!(
            parser.parse("SubproblemSolver.MinMaxSlack = 5 ").unwrap(),
            Some(("SubproblemSolver.MinMaxSlack".to_string(), "5".to_string()))
        );
        assert_eq!(parser.parse("# comment = 3").unwrap(), None);
        assert_eq!(parser.parse("   ").unwrap(), None);
        assert_eq!(
            parser.parse("SubgradientSearch.TransportFile=").unwrap(),
            Some(("SubgradientSearch.TransportFile".to_string(), String::new()))
        );
        assert!(parser.parse("=orphan").is_err());
    }

    #[test]
    fn parse_fixture_problem() {
        let problem = parse_problem(WT1_PROBLEM).unwrap();

        assert_eq!(problem.job_count, 15);
        assert_eq!(problem.machine_count, 28);
        assert_eq!(problem.jobs.len(), 15);

        let first = &problem.jobs[0];
        assert_eq!(first.operations.len(), 6);
        assert_eq!(first.release_time, 0);
        assert_eq!(first.due_date, 45);
        assert_eq!(first.weight, 1);

        let machines: Vec<(usize, u32)> = first.operations[0]
            .alternatives
            .iter()
            .map(|alt| (alt.machine, alt.process_time))
            .collect();
        assert_eq!(machines, vec![(2, 3), (5, 5)]);

        assert_eq!(problem.jobs[5].operations.len(), 7);
        assert_eq!(problem.jobs[5].operations[0].alternatives.len(), 5);
        assert_eq!(problem.jobs[14].weight, 4);
    }

    #[test]
    fn tuple_stream_is_consumed_per_operation() {
        let problem = parse_problem("1 2\n2 2 1 5 2 3 1 2 4 0 6 1\n").unwrap();
        let job = &problem.jobs[0];

        assert_eq!(job.operations.len(), 2);
        assert_eq!(job.operations[0].alternatives.len(), 2);
        assert_eq!(job.operations[0].alternatives[0].machine, 1);
        assert_eq!(job.operations[0].alternatives[0].process_time, 5);
        assert_eq!(job.operations[0].alternatives[1].machine, 2);
        assert_eq!(job.operations[0].alternatives[1].process_time, 3);
        assert_eq!(job.operations[1].alternatives[0].machine, 2);
        assert_eq!(job.operations[1].alternatives[0].process_time, 4);
        assert_eq!(job.due_date, 6);
    }

    #[test]
    fn malformed_problem_files() {
        assert!(matches!(parse_problem(""), Err(FjsParseError::EmptyProblem)));
        assert!(matches!(
            parse_problem("asd"),
            Err(FjsParseError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            parse_problem("2 2 2\n"),
            Err(FjsParseError::InvalidHeader { .. })
        ));
        assert!(matches!(
            parse_problem("2 2\n1 1 1 3 0 5 1\n"),
            Err(FjsParseError::MissingJobLines {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            parse_problem("1 2\n2 1 1 3 0 5 1\n"),
            Err(FjsParseError::InsufficientTuples {
                line: 2,
                operation: 1
            })
        ));
        assert!(matches!(
            parse_problem("1 2\n1 1 3 3 0 5 1\n"),
            Err(FjsParseError::MachineOutOfRange { machine: 3, .. })
        ));
        assert!(matches!(
            parse_problem("1 2\n1 2 1 3 1 4 0 5 1\n"),
            Err(FjsParseError::DuplicateMachine { machine: 1, .. })
        ));
        assert!(matches!(
            parse_problem("1 2\n1 1 1 0 0 5 1\n"),
            Err(FjsParseError::ZeroProcessTime { .. })
        ));
        assert!(matches!(
            parse_problem("1 2\n1 0 0 5 1\n"),
            Err(FjsParseError::NoAlternativeMachines { .. })
        ));
        assert!(matches!(
            parse_problem("1 2\n1 1 x 3 0 5 1\n"),
            Err(FjsParseError::Syntax { line: 2, .. })
        ));
    }

    #[test]
    fn parse_fixture_transport() {
        let transport = parse_transport_times(WT1_TRANSPORT, 28).unwrap();

        assert_eq!(transport.rows_read, 28);
        assert_eq!(transport.times.len(), 28);
        assert_eq!(transport.times[0][3], 22);
        assert_eq!(transport.times[3][0], 22);
        assert_eq!(transport.times[13][14], 24);
        assert!(transport.times.iter().all(|row| row.len() == 28));
    }

    #[test]
    fn short_transport_is_zero_filled() {
        let transport = parse_transport_times("0 4\n", 3).unwrap();

        assert_eq!(transport.rows_read, 1);
        assert_eq!(transport.times, vec![vec![0, 4, 0], vec![0; 3], vec![0; 3]]);

        let empty = parse_transport_times("", 2).unwrap();
        assert_eq!(empty.rows_read, 0);
        assert_eq!(empty.times, vec![vec![0; 2]; 2]);
    }

    #[test]
    fn parse_fixture_properties() {
        let properties = parse_properties(WT1_PROPERTIES).unwrap();

        assert!(properties
            .entries
            .contains(&("SubgradientSearch.NrTimeSlots".to_string(), "800".to_string())));
        assert!(properties.entries.contains(&(
            "SubproblemSolver.type".to_string(),
            "VariableNeighbourhoodSearch".to_string()
        )));
        assert!(properties.entries.iter().all(|(key, _)| !key.starts_with('#')));
    }
}
