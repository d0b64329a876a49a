//! Obtains a query result from a possibly unreliable service.
//!
//! One call walks through `INIT -> QUERYING -> (SUCCESS | RETRY_WAIT -> QUERYING | EXHAUSTED)`:
//!
//! * every attempt is bounded by the per-attempt timeout and by what is left of the deadline,
//! * timeouts, transport and API errors are all retried alike,
//! * between attempts it sleeps for the interval, cut short by the deadline,
//! * once the retry budget or the deadline is used up the last error is returned.
//!
//! The deadline is always set, either explicitly or as the worst case of the retry budget.
//!
//! Time is taken from tokio, so tests drive it with a paused clock.

use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, timeout, Instant};

use crate::model::QueryResponse;
use crate::query::{QueryApi, QueryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound of a single attempt.
    pub timeout: Duration,
    /// Attempts after the first one. `0` fails right away.
    pub retries: u32,
    /// Wait between two attempts.
    pub interval: Duration,
    /// Ceiling for all attempts and waits together. Defaults to [RetryPolicy::ceiling].
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// The time a whole retry run may take: the configured deadline, or every attempt running
    /// into its timeout plus every wait.
    pub fn ceiling(&self) -> Duration {
        self.deadline.unwrap_or_else(|| {
            self.timeout
                .saturating_mul(self.max_attempts())
                .saturating_add(self.interval.saturating_mul(self.retries))
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            timeout: Duration::from_secs(30),
            retries: 0,
            interval: Duration::from_secs(60),
            deadline: None,
        }
    }
}

#[derive(Debug)]
pub enum RetryOutcome {
    Success(QueryResponse),
    Exhausted { attempts: u32, error: QueryError },
}

pub async fn query_with_retry<Q>(api: &Q, query: &str, policy: &RetryPolicy) -> RetryOutcome
where
    Q: QueryApi + Sync + ?Sized,
{
    // A ceiling too far out to be represented never ends the run.
    let deadline = Instant::now().checked_add(policy.ceiling());
    let remaining = || deadline.map(|d| d.saturating_duration_since(Instant::now()));

    let mut attempt = 0;
    loop {
        attempt += 1;

        let budget = remaining().map_or(policy.timeout, |r| r.min(policy.timeout));
        tracing::debug!(attempt, timeout_secs = budget.as_secs_f64(), "Sending query");

        let error = match timeout(budget, api.query(query, Utc::now())).await {
            Ok(Ok(response)) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Query succeeded after retrying");
                }
                return RetryOutcome::Success(response);
            }
            Ok(Err(error)) => error,
            Err(_) => QueryError::Timeout,
        };

        if attempt >= policy.max_attempts() {
            tracing::warn!(attempts = attempt, error = %error, "Query failed, no retries left");
            return RetryOutcome::Exhausted {
                attempts: attempt,
                error,
            };
        }

        let wait = remaining().map_or(policy.interval, |r| r.min(policy.interval));
        tracing::warn!(
            attempt,
            error = %error,
            wait_secs = wait.as_secs_f64(),
            "Query failed, retrying"
        );
        sleep(wait).await;

        if remaining() == Some(Duration::ZERO) {
            tracing::warn!(attempts = attempt, "Deadline reached, giving up");
            return RetryOutcome::Exhausted {
                attempts: attempt,
                error,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::model::QueryData;
    use crate::query::fake::{respond, ScriptedApi};

    /// Takes `delay` to answer every query.
    struct SlowApi {
        delay: Duration,
    }

    #[async_trait]
    impl QueryApi for SlowApi {
        async fn query(&self, _: &str, _: DateTime<Utc>) -> Result<QueryResponse, QueryError> {
            sleep(self.delay).await;
            Ok(QueryResponse::new(QueryData::Scalar(1.0)))
        }
    }

    fn ok(value: f64) -> Result<QueryResponse, QueryError> {
        respond(QueryData::Scalar(value))
    }

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(5),
            retries,
            interval: Duration::from_secs(60),
            deadline: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let api = ScriptedApi::new(vec![ok(3.0)]);
        let started = Instant::now();

        let outcome = query_with_retry(&api, "up", &policy(3)).await;

        match outcome {
            RetryOutcome::Success(response) => assert_eq!(response.data, QueryData::Scalar(3.0)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(api.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let api = ScriptedApi::new(vec![
            Err(QueryError::Timeout),
            Err(QueryError::Http("API returned status 503".to_owned())),
            ok(42.0),
        ]);
        let started = Instant::now();

        let outcome = query_with_retry(&api, "up", &policy(3)).await;

        match outcome {
            RetryOutcome::Success(response) => assert_eq!(response.data, QueryData::Scalar(42.0)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(api.calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_last_error() {
        let api = ScriptedApi::new(vec![
            Err(QueryError::Connection("first".to_owned())),
            Err(QueryError::Http("second".to_owned())),
            Err(QueryError::Api {
                error_type: "execution".to_owned(),
                message: "third".to_owned(),
            }),
        ]);

        let outcome = query_with_retry(&api, "up", &policy(2)).await;

        match outcome {
            RetryOutcome::Exhausted { attempts, error } => {
                assert_eq!(attempts, 3);
                assert_eq!(error.to_string(), "execution: third");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_fails_immediately() {
        let api = ScriptedApi::new(vec![Err(QueryError::Timeout), ok(1.0)]);
        let started = Instant::now();

        let outcome = query_with_retry(&api, "up", &policy(0)).await;

        assert!(matches!(
            outcome,
            RetryOutcome::Exhausted {
                attempts: 1,
                error: QueryError::Timeout
            }
        ));
        assert_eq!(api.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempts_time_out_and_are_retried() {
        let api = SlowApi {
            delay: Duration::from_secs(10),
        };
        let started = Instant::now();

        let outcome = query_with_retry(&api, "up", &policy(1)).await;

        assert!(matches!(
            outcome,
            RetryOutcome::Exhausted {
                attempts: 2,
                error: QueryError::Timeout
            }
        ));
        // Two 5s attempts with a 60s wait in between.
        assert!(started.elapsed() >= Duration::from_secs(70));
        assert!(started.elapsed() < Duration::from_secs(71));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_retries() {
        let api = ScriptedApi::new(vec![]);
        let policy = RetryPolicy {
            deadline: Some(Duration::from_secs(150)),
            ..policy(10)
        };
        let started = Instant::now();

        let outcome = query_with_retry(&api, "up", &policy).await;

        // Attempts at 0s, 60s and 120s, then the wait is cut to the deadline.
        match outcome {
            RetryOutcome::Exhausted { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(error, QueryError::Connection(_)));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(api.calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(150));
        assert!(started.elapsed() < Duration::from_secs(151));
    }

    #[test]
    fn test_ceiling() {
        assert_eq!(RetryPolicy::default().ceiling(), Duration::from_secs(30));
        // 4 attempts of 5s and 3 waits of 60s.
        assert_eq!(policy(3).ceiling(), Duration::from_secs(200));

        let explicit = RetryPolicy {
            deadline: Some(Duration::from_secs(42)),
            ..policy(3)
        };
        assert_eq!(explicit.ceiling(), Duration::from_secs(42));

        let huge = RetryPolicy {
            timeout: Duration::MAX,
            ..policy(u32::MAX)
        };
        assert_eq!(huge.ceiling(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_stops_at_ceiling() {
        let api = SlowApi {
            delay: Duration::from_secs(3600),
        };
        let policy = policy(2);
        let started = Instant::now();

        let outcome = query_with_retry(&api, "up", &policy).await;

        assert!(matches!(
            outcome,
            RetryOutcome::Exhausted {
                attempts: 3,
                error: QueryError::Timeout
            }
        ));
        // Three 5s attempts and two 60s waits.
        assert_eq!(policy.ceiling(), Duration::from_secs(135));
        assert!(started.elapsed() >= policy.ceiling());
        assert!(started.elapsed() < Duration::from_secs(136));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_deadline_does_not_overflow() {
        let api = ScriptedApi::new(vec![Err(QueryError::Timeout), ok(9.0)]);
        let policy = RetryPolicy {
            deadline: Some(Duration::from_secs(u64::MAX)),
            ..policy(1)
        };

        let outcome = query_with_retry(&api, "up", &policy).await;

        match outcome {
            RetryOutcome::Success(response) => assert_eq!(response.data, QueryData::Scalar(9.0)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_attempt() {
        let api = SlowApi {
            delay: Duration::from_secs(100),
        };
        let policy = RetryPolicy {
            timeout: Duration::from_secs(30),
            deadline: Some(Duration::from_secs(10)),
            ..policy(5)
        };
        let started = Instant::now();

        let outcome = query_with_retry(&api, "up", &policy).await;

        assert!(matches!(
            outcome,
            RetryOutcome::Exhausted {
                attempts: 1,
                error: QueryError::Timeout
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(11));
    }
}
