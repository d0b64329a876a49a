//! Command line surface of the check.

use clap::{ArgAction, ArgGroup, Parser, ValueEnum};

use crate::{Range, ServiceState};

const ABOUT: &str = "Checks that the value returned by a Prometheus query falls within \
warning and critical thresholds given in nagios range format.";

const LONG_ABOUT: &str = "Checks that the value returned by a Prometheus query falls within \
warning and critical thresholds given in nagios range format.

Example:
    check_prometheus -H 'my.host' -q 'query' -w 10 -c 100

Meaning: the value returned by the query 'query' is OK if it lies between 0 and 10, warning \
if it is greater than 10 but at most 100, and critical if it is greater than 100 or less \
than zero. Vector results are checked series by series and the worst state wins.";

/// State to report when the query matches no series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmptyResult {
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl From<EmptyResult> for ServiceState {
    fn from(empty: EmptyResult) -> Self {
        match empty {
            EmptyResult::Ok => ServiceState::Ok,
            EmptyResult::Warn => ServiceState::Warning,
            EmptyResult::Crit => ServiceState::Critical,
            EmptyResult::Unknown => ServiceState::Unknown,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "check_prometheus", version, about = ABOUT, long_about = LONG_ABOUT)]
#[command(group(
    ArgGroup::new("thresholds")
        .args(["warning", "critical"])
        .required(true)
        .multiple(true)
))]
pub struct Cli {
    /// Prometheus host, with or without scheme
    #[arg(short = 'H', long)]
    pub host: String,

    /// Prometheus query
    #[arg(short, long)]
    pub query: String,

    /// Warning range
    #[arg(short, long, allow_hyphen_values = true)]
    pub warning: Option<Range>,

    /// Critical range
    #[arg(short, long, allow_hyphen_values = true)]
    pub critical: Option<Range>,

    /// Exit status if the query returns an empty result
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = EmptyResult::Unknown)]
    pub empty: EmptyResult,

    /// Short, descriptive name put in front of the check output
    #[arg(short, long)]
    pub name: Option<String>,

    /// Timeout of a single query in seconds
    #[arg(short, long, default_value_t = 30)]
    pub timeout: u64,

    /// Number of times to retry a failed query
    #[arg(short, long, default_value_t = 0)]
    pub retry: u32,

    /// Seconds to wait between two attempts
    #[arg(short, long, default_value_t = 60)]
    pub interval: u64,

    /// Seconds after which no further attempt is made. Defaults to all attempts timing out
    /// plus all waits
    #[arg(short, long)]
    pub deadline: Option<u64>,

    /// Log more details to stderr, repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
