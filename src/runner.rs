use std::fmt::Display;

use crate::{Report, ServiceState};

/// Runs a check and turns an error into a nagios result instead of a panic or a bare exit
/// code. Errors are reported as [ServiceState::Unknown] unless [Runner::on_error] says
/// otherwise.
pub struct Runner<E> {
    on_error: Option<Box<dyn FnOnce(&E) -> ServiceState>>,
}

impl<E: Display> Runner<E> {
    pub fn new() -> Self {
        Self { on_error: None }
    }

    /// Picks the state reported for the error.
    pub fn on_error(mut self, f: impl FnOnce(&E) -> ServiceState + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn safe_run(self, f: impl FnOnce() -> Result<Report, E>) -> RunnerResult<E> {
        match f() {
            Ok(report) => RunnerResult::Ok(report),
            Err(err) => {
                let state = self
                    .on_error
                    .map(|f| f(&err))
                    .unwrap_or(ServiceState::Unknown);

                RunnerResult::Err(state, err)
            }
        }
    }
}

impl<E: Display> Default for Runner<E> {
    fn default() -> Self {
        Self::new()
    }
}

pub enum RunnerResult<E> {
    Ok(Report),
    Err(ServiceState, E),
}

impl<E: Display> RunnerResult<E> {
    /// The line printed for this result.
    pub fn to_nagios_string(&self) -> String {
        match self {
            RunnerResult::Ok(report) => report.to_nagios_string(),
            RunnerResult::Err(state, err) => format!("{}: {}", state, err),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerResult::Ok(report) => report.exit_code(),
            RunnerResult::Err(state, _) => state.exit_code(),
        }
    }

    pub fn print_and_exit(self) -> ! {
        println!("{}", self.to_nagios_string());
        std::process::exit(self.exit_code());
    }
}
