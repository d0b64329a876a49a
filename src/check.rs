//! Runs one check: query, classify, aggregate.

use crate::aggregate::{aggregate, CheckOutcome};
use crate::classify::{classify, Thresholds};
use crate::config::CheckConfig;
use crate::model::{QueryResponse, QueryResult, UnsupportedResultType};
use crate::query::{QueryApi, QueryError};
use crate::retry::{query_with_retry, RetryOutcome};
use crate::ServiceState;

/// Everything that ends a check before it produced an outcome. All of them are reported as
/// `UNKNOWN`.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("Error querying Prometheus: {0}")]
    Query(#[from] QueryError),
    #[error(transparent)]
    UnsupportedResultType(#[from] UnsupportedResultType),
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

pub async fn run_check<Q>(api: &Q, config: &CheckConfig) -> Result<CheckOutcome, CheckError>
where
    Q: QueryApi + Sync + ?Sized,
{
    let QueryResponse { data, warnings } =
        match query_with_retry(api, &config.query, &config.retry).await {
            RetryOutcome::Success(response) => response,
            RetryOutcome::Exhausted { error, .. } => return Err(CheckError::Query(error)),
        };

    for warning in &warnings {
        tracing::warn!(warning = %warning, "Prometheus returned a warning");
    }

    tracing::debug!(result_type = data.kind(), "Evaluating query result");
    let result = QueryResult::try_from(data)?;

    let mut outcome = evaluate(result, &config.thresholds, config.empty_result);
    outcome.warnings = warnings
        .into_iter()
        .map(|w| format!("Warning: {}", w))
        .collect();

    Ok(outcome)
}

/// Scores a result. An empty vector skips the classifier and gets `empty_result` as state.
pub fn evaluate(
    result: QueryResult,
    thresholds: &Thresholds,
    empty_result: ServiceState,
) -> CheckOutcome {
    if result.is_empty() {
        return CheckOutcome::empty_result(empty_result);
    }

    aggregate(classify(result, thresholds))
}
