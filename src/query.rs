//! The boundary to the service evaluating queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::QueryResponse;

/// Errors that can occur while asking the query service for a result. All of them are
/// retried by [crate::retry::query_with_retry].
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("request timed out")]
    Timeout,

    /// The service answered, but refused to evaluate the query.
    #[error("{error_type}: {message}")]
    Api { error_type: String, message: String },

    /// Failed to parse response.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The HTTP client could not be set up.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QueryError::Timeout
        } else if err.is_connect() {
            QueryError::Connection(err.to_string())
        } else if err.is_decode() {
            QueryError::Parse(err.to_string())
        } else {
            QueryError::Http(err.to_string())
        }
    }
}

/// Evaluates a query at a point in time.
#[async_trait]
pub trait QueryApi {
    async fn query(&self, query: &str, time: DateTime<Utc>) -> Result<QueryResponse, QueryError>;
}
