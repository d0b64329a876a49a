//! The check_prometheus crate evaluates the result of a Prometheus query against nagios
//! threshold ranges and reports it the way nagios and icinga expect a check to do.
//!
//! The pieces fit together like this:
//!
//! * [retry::query_with_retry] obtains a [QueryResponse] from a [QueryApi],
//! * [classify::classify] scores every sample against the warning and critical [Range],
//! * [aggregate::aggregate] folds the scores into one [CheckOutcome],
//! * [Report] renders the outcome and exits with the matching code.
//!
//! [check::run_check] drives all of it for a [config::CheckConfig].

use std::cmp::Ordering;
use std::fmt;
use std::process;

pub mod aggregate;
pub mod check;
pub mod classify;
pub mod cli;
pub mod config;
pub mod config_generator;
pub mod model;
pub mod prometheus;
pub mod query;
pub mod range;
pub mod retry;
mod runner;

pub use crate::aggregate::CheckOutcome;
pub use crate::model::{LabelSet, QueryData, QueryResponse, QueryResult, Sample};
pub use crate::query::{QueryApi, QueryError};
pub use crate::range::{Range, RangeParseError};
pub use crate::runner::{Runner, RunnerResult};

/// Represents a service state from nagios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// Returns the corresponding nagios exit code to signal the service state of self.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceState::Ok => 0,
            ServiceState::Warning => 1,
            ServiceState::Critical => 2,
            ServiceState::Unknown => 3,
        }
    }

    fn severity(&self) -> u8 {
        match self {
            ServiceState::Ok => 0,
            ServiceState::Unknown => 1,
            ServiceState::Warning => 2,
            ServiceState::Critical => 3,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Ok => "OK",
            ServiceState::Warning => "WARNING",
            ServiceState::Critical => "CRITICAL",
            ServiceState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// States are ordered by severity: `Ok < Unknown < Warning < Critical`.
impl Ord for ServiceState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl PartialOrd for ServiceState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The purpose of ToPerfString is only so one can define custom representations of custom types
/// without using the ToString trait so we don't interfere with that.
pub trait ToPerfString {
    fn to_perf_string(&self) -> String;
}

/// NaN is rendered as `U`, which nagios reads as "value could not be determined".
impl ToPerfString for f64 {
    fn to_perf_string(&self) -> String {
        if self.is_nan() {
            "U".to_owned()
        } else {
            self.to_string()
        }
    }
}

impl ToPerfString for Range {
    fn to_perf_string(&self) -> String {
        self.to_string()
    }
}

impl<T> ToPerfString for Option<T>
where
    T: ToPerfString,
{
    fn to_perf_string(&self) -> String {
        match self {
            Some(ref s) => s.to_perf_string(),
            None => String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Unit {
    #[default]
    None,
    Seconds,
    Milliseconds,
    Microseconds,
    Percentage,
    Bytes,
    KiloBytes,
    MegaBytes,
    TeraBytes,
    Counter,
    Other(String),
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Unit::None => "",
            Unit::Seconds => "s",
            Unit::Milliseconds => "ms",
            Unit::Microseconds => "us",
            Unit::Percentage => "%",
            Unit::Bytes => "B",
            Unit::KiloBytes => "KB",
            Unit::MegaBytes => "MB",
            Unit::TeraBytes => "TB",
            Unit::Counter => "c",
            Unit::Other(s) => s,
        };
        f.write_str(s)
    }
}

/// A single performance data entry: `name=value[unit];[warn];[crit]`.
#[derive(Clone, Debug, PartialEq)]
pub struct PerfData {
    name: String,
    value: f64,
    unit: Unit,
    warning: Option<Range>,
    critical: Option<Range>,
}

impl PerfData {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        PerfData {
            name: name.into(),
            value,
            unit: Unit::None,
            warning: None,
            critical: None,
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_thresholds(mut self, warning: Option<Range>, critical: Option<Range>) -> Self {
        self.warning = warning;
        self.critical = critical;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }
}

impl ToPerfString for PerfData {
    fn to_perf_string(&self) -> String {
        // replace `=`
        let name = self.name.replace('=', "_");

        // quote `'`
        let name = name.replace('\'', "''");

        // quote if contains spaces
        let name = if name.contains(' ') {
            format!("'{}'", name)
        } else {
            name
        };

        let fields = [
            format!("{}{}", self.value.to_perf_string(), self.unit),
            self.warning.to_perf_string(),
            self.critical.to_perf_string(),
        ];

        format!("{}={}", name, fields.join(";").trim_end_matches(';'))
    }
}

/// The rendered result of one check run.
///
/// ```rust
/// # use check_prometheus::{PerfData, Report, ServiceState};
/// let report = Report::new(ServiceState::Ok)
///     .with_description("returned 12")
///     .with_perf_data(PerfData::new("scalar", 12.0));
/// assert_eq!(&report.to_nagios_string(), "OK: returned 12 | scalar=12");
/// ```
#[derive(Clone, Debug)]
pub struct Report {
    name: Option<String>,
    state: ServiceState,
    description: Option<String>,
    perf_data: Vec<PerfData>,
    long_output: Vec<String>,
}

impl Report {
    pub fn new(state: ServiceState) -> Report {
        Report {
            name: None,
            state,
            description: None,
            perf_data: Vec::new(),
            long_output: Vec::new(),
        }
    }

    /// Set the name of this report. Will be put in front of the state in the final output.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_perf_data(mut self, perf_data: PerfData) -> Self {
        self.perf_data.push(perf_data);
        self
    }

    /// Adds a line printed after the status line.
    pub fn with_long_output(mut self, line: impl Into<String>) -> Self {
        self.long_output.push(line.into());
        self
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn perf_data(&self) -> &[PerfData] {
        &self.perf_data
    }

    /// Returns a string which nagios understands to determine the service state.
    pub fn to_nagios_string(&self) -> String {
        let mut s = String::new();

        if let Some(ref name) = self.name {
            s.push_str(&format!("{} ", name))
        }

        s.push_str(&self.state.to_string());

        if let Some(ref description) = self.description {
            s.push_str(&format!(": {}", description));
        }

        if !self.perf_data.is_empty() {
            s.push_str(" |");

            for perf_data in self.perf_data.iter() {
                s.push_str(&format!(" {}", perf_data.to_perf_string()));
            }
        }

        for line in self.long_output.iter() {
            s.push('\n');
            s.push_str(line);
        }

        s
    }

    pub fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }

    /// Will print Self::to_nagios_string and exit with the exit code from Self::exit_code
    pub fn print_and_exit(&self) -> ! {
        println!("{}", self.to_nagios_string());
        process::exit(self.exit_code());
    }
}

impl From<CheckOutcome> for Report {
    fn from(outcome: CheckOutcome) -> Self {
        let CheckOutcome {
            status,
            message,
            perf_data,
            warnings,
        } = outcome;

        Report {
            name: None,
            state: status,
            description: Some(message),
            perf_data,
            long_output: warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{CheckOutcome, PerfData, Range, Report, ServiceState, ToPerfString, Unit};

    #[test]
    fn test_perf_data() {
        let perf = PerfData::new("foo", 12.0);
        assert_eq!(&perf.to_perf_string(), "foo=12");

        let perf = PerfData::new("foo", 12.5).with_unit(Unit::Microseconds);
        assert_eq!(&perf.to_perf_string(), "foo=12.5us");

        let perf = PerfData::new("foo", 12.0).with_unit(Unit::Other("bar".to_owned()));
        assert_eq!(&perf.to_perf_string(), "foo=12bar");

        let warning: Range = "10".parse().unwrap();
        let critical: Range = "@~:0".parse().unwrap();
        let perf = PerfData::new("foo", 3.0).with_thresholds(Some(warning), Some(critical));
        assert_eq!(&perf.to_perf_string(), "foo=3;10;@~:0");

        let perf = PerfData::new("foo", 3.0).with_thresholds(Some(warning), None);
        assert_eq!(&perf.to_perf_string(), "foo=3;10");

        let perf = PerfData::new("foo", 3.0).with_thresholds(None, Some(warning));
        assert_eq!(&perf.to_perf_string(), "foo=3;;10");

        let perf = PerfData::new("foo", f64::NAN);
        assert_eq!(&perf.to_perf_string(), "foo=U");
    }

    #[test]
    fn test_perf_data_names() {
        let test_data = [
            ("test", "test=0"),
            ("test=a", "test_a=0"),
            ("te'st", "te''st=0"),
            ("te st", "'te st'=0"),
            (r#"up{job="a b"}"#, r#"'up{job_"a b"}'=0"#),
        ];
        for (label, expected_string) in &test_data {
            let perf = PerfData::new(*label, 0.0);
            assert_eq!(&perf.to_perf_string(), expected_string);
        }
    }

    #[test]
    fn test_report() {
        let report = Report::new(ServiceState::Ok);
        assert_eq!(&report.to_nagios_string(), "OK");

        let report = Report::new(ServiceState::Critical)
            .with_description("a is critical (150.00)")
            .with_perf_data(PerfData::new("a", 150.0))
            .with_perf_data(PerfData::new("b", 5.0));
        assert_eq!(
            &report.to_nagios_string(),
            "CRITICAL: a is critical (150.00) | a=150 b=5"
        );
        assert_eq!(report.exit_code(), 2);

        let report = Report::new(ServiceState::Warning)
            .with_name("latency")
            .with_description("returned 50")
            .with_long_output("Warnings: partial response");
        assert_eq!(
            &report.to_nagios_string(),
            "latency WARNING: returned 50\nWarnings: partial response"
        );
    }

    #[test]
    fn test_report_from_outcome() {
        let outcome = CheckOutcome {
            status: ServiceState::Warning,
            message: "returned 50".to_owned(),
            perf_data: vec![PerfData::new("scalar", 50.0)],
            warnings: vec!["Warnings: something".to_owned()],
        };

        let report = Report::from(outcome);
        assert_eq!(report.state(), ServiceState::Warning);
        assert_eq!(report.description(), Some("returned 50"));
        assert_eq!(report.perf_data().len(), 1);
        assert_eq!(
            &report.to_nagios_string(),
            "WARNING: returned 50 | scalar=50\nWarnings: something"
        );
    }

    #[test]
    fn test_state() {
        assert_eq!(ServiceState::Ok.exit_code(), 0);
        assert_eq!(ServiceState::Warning.exit_code(), 1);
        assert_eq!(ServiceState::Critical.exit_code(), 2);
        assert_eq!(ServiceState::Unknown.exit_code(), 3);

        assert_eq!(&ServiceState::Ok.to_string(), "OK");
        assert_eq!(&ServiceState::Warning.to_string(), "WARNING");
        assert_eq!(&ServiceState::Critical.to_string(), "CRITICAL");
        assert_eq!(&ServiceState::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_state_severity() {
        assert!(ServiceState::Ok < ServiceState::Unknown);
        assert!(ServiceState::Unknown < ServiceState::Warning);
        assert!(ServiceState::Warning < ServiceState::Critical);
        assert_eq!(
            std::cmp::max(ServiceState::Warning, ServiceState::Critical),
            ServiceState::Critical
        );
    }
}
