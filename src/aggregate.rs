//! Folds per-sample verdicts into the overall outcome of a check.

use crate::classify::{Classification, Classified, ResultKind};
use crate::{PerfData, ServiceState};

pub const EMPTY_RESULT_MESSAGE: &str = "The query did not return any result";

/// The overall result of a check, ready to be rendered by [crate::Report].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub status: ServiceState,
    pub message: String,
    pub perf_data: Vec<PerfData>,
    /// Lines printed after the status line.
    pub warnings: Vec<String>,
}

impl CheckOutcome {
    pub fn new(status: ServiceState, message: impl Into<String>) -> Self {
        CheckOutcome {
            status,
            message: message.into(),
            perf_data: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The outcome of a query which matched no series at all.
    pub fn empty_result(status: ServiceState) -> Self {
        CheckOutcome::new(status, EMPTY_RESULT_MESSAGE)
    }
}

/// NaN samples are reported but left out of the severity fold. The outcome is only `Unknown`
/// when every sample is NaN, which covers a lone NaN scalar.
///
/// A scalar is the whole check, so its message is always `returned <value>` and the state
/// carries the severity. Vectors list every critical series, then every warning series.
pub fn aggregate(classification: Classification) -> CheckOutcome {
    let Classification {
        kind,
        items,
        perf_data,
    } = classification;

    let all_nan = !items.is_empty() && items.iter().all(|c| c.verdict == ServiceState::Unknown);

    let status = if all_nan {
        ServiceState::Unknown
    } else {
        items
            .iter()
            .map(|c| c.verdict)
            .filter(|v| *v != ServiceState::Unknown)
            .max()
            .unwrap_or(ServiceState::Ok)
    };

    let message = match kind {
        ResultKind::Scalar => match items.first() {
            Some(item) if !all_nan => format!("returned {}", format_value(item.value, None)),
            _ => "NaN value returned".to_owned(),
        },
        ResultKind::Vector => {
            let alerts: Vec<String> = alert_lines(&items, ServiceState::Critical, "critical")
                .chain(alert_lines(&items, ServiceState::Warning, "warning"))
                .collect();

            if !alerts.is_empty() {
                alerts.join(", ")
            } else if all_nan {
                "All metrics returned NaN".to_owned()
            } else {
                "All metrics OK".to_owned()
            }
        }
    };

    CheckOutcome {
        status,
        message,
        perf_data,
        warnings: Vec::new(),
    }
}

fn alert_lines<'a>(
    items: &'a [Classified],
    verdict: ServiceState,
    label: &'a str,
) -> impl Iterator<Item = String> + 'a {
    items
        .iter()
        .filter(move |c| c.verdict == verdict)
        .map(move |c| format!("{} is {} ({})", c.name, label, format_value(c.value, Some(2))))
}

/// Infinities are spelled the way Prometheus writes them.
fn format_value(value: f64, precision: Option<usize>) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_owned();
    }

    match precision {
        Some(precision) => format!("{:.*}", precision, value),
        None => value.to_string(),
    }
}
