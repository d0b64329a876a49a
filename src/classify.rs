//! Scores every sample of a query result against the warning and critical ranges.
//!
//! The classifier neither composes messages nor decides the overall state, see
//! [crate::aggregate] for that.

use crate::model::QueryResult;
use crate::{PerfData, Range, ServiceState};

/// Performance data name used for scalar results.
pub const SCALAR_NAME: &str = "scalar";

/// The warning and critical ranges of a check. A missing range never matches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub warning: Option<Range>,
    pub critical: Option<Range>,
}

impl Thresholds {
    pub fn new(warning: Option<Range>, critical: Option<Range>) -> Self {
        Thresholds { warning, critical }
    }

    /// Critical is checked first, so it wins when a value violates both ranges.
    pub fn verdict(&self, value: f64) -> ServiceState {
        if value.is_nan() {
            return ServiceState::Unknown;
        }

        let violates = |range: &Option<Range>| range.map_or(false, |r| r.is_violated_by(value));

        if violates(&self.critical) {
            ServiceState::Critical
        } else if violates(&self.warning) {
            ServiceState::Warning
        } else {
            ServiceState::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Scalar,
    Vector,
}

/// The verdict for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub name: String,
    pub value: f64,
    /// One of `Ok`, `Warning`, `Critical`, or `Unknown` for NaN values.
    pub verdict: ServiceState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: ResultKind,
    pub items: Vec<Classified>,
    /// Exactly one entry per sample, in sample order.
    pub perf_data: Vec<PerfData>,
}

pub fn classify(result: QueryResult, thresholds: &Thresholds) -> Classification {
    let (kind, samples) = match result {
        QueryResult::Scalar(sample) => (ResultKind::Scalar, vec![sample]),
        QueryResult::Vector(samples) => (ResultKind::Vector, samples),
    };

    let mut items = Vec::with_capacity(samples.len());
    let mut perf_data = Vec::with_capacity(samples.len());

    for sample in samples {
        let name = match kind {
            ResultKind::Scalar => SCALAR_NAME.to_owned(),
            ResultKind::Vector => sample.labels.to_string(),
        };
        let verdict = thresholds.verdict(sample.value);

        tracing::debug!(name = %name, value = sample.value, verdict = %verdict, "Classified sample");

        perf_data.push(
            PerfData::new(name.clone(), sample.value)
                .with_thresholds(thresholds.warning, thresholds.critical),
        );
        items.push(Classified {
            name,
            value: sample.value,
            verdict,
        });
    }

    Classification {
        kind,
        items,
        perf_data,
    }
}
