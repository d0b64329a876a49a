//! Query client for the Prometheus HTTP API.
//!
//! Instant queries go to `GET /api/v1/query`. The answer is an envelope like
//!
//! ```json
//! {
//!   "status": "success",
//!   "data": { "resultType": "vector", "result": [ { "metric": {}, "value": [1.5, "1"] } ] },
//!   "warnings": []
//! }
//! ```
//!
//! where sample values are strings and may be `NaN`, `+Inf` or `-Inf`. Failed queries carry
//! `errorType` and `error` instead of `data`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::model::{LabelSet, QueryData, QueryResponse, Sample};
use crate::query::{QueryApi, QueryError};

const QUERY_PATH: &str = "/api/v1/query";
const MAX_BODY_IN_ERROR: usize = 200;

/// Prepends `http://` to addresses without a scheme and strips trailing slashes from the
/// part after the scheme. An empty authority stays empty, so `http://` fails to parse later.
pub fn normalize_endpoint(host: &str) -> String {
    let host = host.trim();
    let (scheme, rest) = host.split_once("://").unwrap_or(("http", host));
    format!("{}://{}", scheme, rest.trim_end_matches('/'))
}

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    client: Client,
    endpoint: String,
}

impl PrometheusClient {
    pub fn builder() -> PrometheusClientBuilder {
        PrometheusClientBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryApi for PrometheusClient {
    async fn query(&self, query: &str, time: DateTime<Utc>) -> Result<QueryResponse, QueryError> {
        let url = format!("{}{}", self.endpoint, QUERY_PATH);
        let time = time.to_rfc3339_opts(SecondsFormat::Millis, true);

        tracing::debug!(url = %url, query, time = %time, "Querying Prometheus");

        let response = self
            .client
            .get(&url)
            .query(&[("query", query), ("time", time.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, bytes = body.len(), "Prometheus responded");

        decode_response(status, &body)
    }
}

/// Builder for PrometheusClient.
#[derive(Debug, Default)]
pub struct PrometheusClientBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl PrometheusClientBuilder {
    /// Set the server address, e.g. "prometheus.local:9090" or "https://prom.example.com".
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the connect and request timeout (default: 30 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<PrometheusClient, QueryError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(30));

        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Client(e.to_string()))?;

        Ok(PrometheusClient {
            client,
            endpoint: normalize_endpoint(
                self.endpoint.as_deref().unwrap_or("http://localhost:9090"),
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiStatus {
    Success,
    Error,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: ApiStatus,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// `[<unix time>, "<value>"]`
type ApiValue = (f64, String);

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum ApiData {
    Scalar(ApiValue),
    Vector(Vec<ApiSample>),
    Matrix(Vec<serde_json::Value>),
    String(ApiValue),
}

#[derive(Debug, Deserialize)]
struct ApiSample {
    #[serde(default)]
    metric: LabelSet,
    value: ApiValue,
}

fn decode_response(status: reqwest::StatusCode, body: &str) -> Result<QueryResponse, QueryError> {
    let envelope: ApiResponse = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(QueryError::Http(format!(
                "API returned status {}: {}",
                status,
                truncate(body, MAX_BODY_IN_ERROR)
            )))
        }
        Err(e) => return Err(QueryError::Parse(e.to_string())),
    };

    match envelope.status {
        ApiStatus::Error => Err(QueryError::Api {
            error_type: envelope.error_type.unwrap_or_else(|| "error".to_owned()),
            message: envelope.error.unwrap_or_default(),
        }),
        ApiStatus::Success => {
            let data = envelope
                .data
                .ok_or_else(|| QueryError::Parse("response has no data".to_owned()))?;

            Ok(QueryResponse {
                data: into_query_data(data)?,
                warnings: envelope.warnings,
            })
        }
    }
}

fn into_query_data(data: ApiData) -> Result<QueryData, QueryError> {
    let data = match data {
        ApiData::Scalar((_, value)) => QueryData::Scalar(parse_sample_value(&value)?),
        ApiData::Vector(samples) => QueryData::Vector(
            samples
                .into_iter()
                .map(|s| Ok(Sample::new(s.metric, parse_sample_value(&s.value.1)?)))
                .collect::<Result<Vec<_>, QueryError>>()?,
        ),
        ApiData::Matrix(series) => QueryData::Matrix(series.len()),
        ApiData::String((_, value)) => QueryData::String(value),
    };

    Ok(data)
}

fn parse_sample_value(value: &str) -> Result<f64, QueryError> {
    match value {
        "NaN" => Ok(f64::NAN),
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => value
            .parse()
            .map_err(|_| QueryError::Parse(format!("invalid sample value '{}'", value))),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }

    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
