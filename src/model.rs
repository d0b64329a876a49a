//! Data returned by a query evaluation.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// The label name Prometheus uses for the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Labels identifying a single series. Only used for identity and display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        LabelSet(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LabelSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Renders the set the way Prometheus prints a metric: `name{a="x", b="y"}`.
impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.get(METRIC_NAME_LABEL);
        let labels: Vec<String> = self
            .0
            .iter()
            .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect();

        match (name, labels.is_empty()) {
            (Some(name), true) => f.write_str(name),
            (None, true) => f.write_str("{}"),
            (name, false) => write!(f, "{}{{{}}}", name.unwrap_or(""), labels.join(", ")),
        }
    }
}

/// One data point of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: LabelSet,
    pub value: f64,
}

impl Sample {
    pub fn new(labels: LabelSet, value: f64) -> Self {
        Sample { labels, value }
    }

    /// An anonymous sample, as used for scalar results.
    pub fn scalar(value: f64) -> Self {
        Sample {
            labels: LabelSet::new(),
            value,
        }
    }
}

/// A result the classifier knows how to score.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Scalar(Sample),
    Vector(Vec<Sample>),
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        match self {
            QueryResult::Scalar(_) => false,
            QueryResult::Vector(samples) => samples.is_empty(),
        }
    }
}

/// The result as handed back by the query collaborator, before it is narrowed down to a
/// [QueryResult].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Scalar(f64),
    Vector(Vec<Sample>),
    /// Range vector, carrying the number of series.
    Matrix(usize),
    String(String),
}

impl QueryData {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryData::Scalar(_) => "scalar",
            QueryData::Vector(_) => "vector",
            QueryData::Matrix(_) => "matrix",
            QueryData::String(_) => "string",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unsupported result type '{0}', the query has to return a scalar or an instant vector")]
pub struct UnsupportedResultType(pub String);

impl TryFrom<QueryData> for QueryResult {
    type Error = UnsupportedResultType;

    fn try_from(data: QueryData) -> Result<Self, Self::Error> {
        match data {
            QueryData::Scalar(value) => Ok(QueryResult::Scalar(Sample::scalar(value))),
            QueryData::Vector(samples) => Ok(QueryResult::Vector(samples)),
            other => Err(UnsupportedResultType(other.kind().to_owned())),
        }
    }
}

/// Everything one successful query call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub data: QueryData,
    /// Non-fatal warnings reported alongside the data.
    pub warnings: Vec<String>,
}

impl QueryResponse {
    pub fn new(data: QueryData) -> Self {
        QueryResponse {
            data,
            warnings: Vec::new(),
        }
    }
}
