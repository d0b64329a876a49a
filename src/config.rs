//! The immutable configuration of one check run, built once from the command line.

use std::time::Duration;

use reqwest::Url;

use crate::classify::Thresholds;
use crate::cli::Cli;
use crate::prometheus::normalize_endpoint;
use crate::retry::RetryPolicy;
use crate::ServiceState;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },
    #[error("query is required")]
    EmptyQuery,
    #[error("at least one of warning or critical is required")]
    MissingThresholds,
    #[error("timeout has to be at least one second")]
    ZeroTimeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckConfig {
    /// Base address of the Prometheus server, always with scheme.
    pub endpoint: String,
    pub query: String,
    pub thresholds: Thresholds,
    pub retry: RetryPolicy,
    /// State reported when the query matches no series.
    pub empty_result: ServiceState,
    pub name: Option<String>,
}

impl TryFrom<Cli> for CheckConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let endpoint = normalize_endpoint(&cli.host);
        match Url::parse(&endpoint) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                return Err(ConfigError::InvalidHost {
                    host: cli.host,
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                })
            }
            Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => {}
            Ok(_) => {
                return Err(ConfigError::InvalidHost {
                    host: cli.host,
                    reason: "no host name".to_owned(),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidHost {
                    host: cli.host,
                    reason: e.to_string(),
                })
            }
        }

        let query = cli.query.trim().to_owned();
        if query.is_empty() {
            return Err(ConfigError::EmptyQuery);
        }

        if cli.warning.is_none() && cli.critical.is_none() {
            return Err(ConfigError::MissingThresholds);
        }

        if cli.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(CheckConfig {
            endpoint,
            query,
            thresholds: Thresholds::new(cli.warning, cli.critical),
            retry: RetryPolicy {
                timeout: Duration::from_secs(cli.timeout),
                retries: cli.retry,
                interval: Duration::from_secs(cli.interval),
                deadline: cli.deadline.map(Duration::from_secs),
            },
            empty_result: cli.empty.into(),
            name: cli.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn config(args: &[&str]) -> Result<CheckConfig, ConfigError> {
        let cli = Cli::try_parse_from(std::iter::once("check_prometheus").chain(args.iter().copied()))
            .unwrap();
        CheckConfig::try_from(cli)
    }

    #[test]
    fn test_from_cli() {
        let config = config(&[
            "-H", "my.host:9090", "-q", " sum(up) ", "-w", "10", "-c", "100", "-e", "crit", "-r",
            "3", "-i", "5", "-d", "20", "-t", "2", "-n", "nodes",
        ])
        .unwrap();

        assert_eq!(config.endpoint, "http://my.host:9090");
        assert_eq!(config.query, "sum(up)");
        assert_eq!(
            config.thresholds,
            Thresholds::new(Some("10".parse().unwrap()), Some("100".parse().unwrap()))
        );
        assert_eq!(
            config.retry,
            RetryPolicy {
                timeout: Duration::from_secs(2),
                retries: 3,
                interval: Duration::from_secs(5),
                deadline: Some(Duration::from_secs(20)),
            }
        );
        assert_eq!(config.empty_result, ServiceState::Critical);
        assert_eq!(config.name.as_deref(), Some("nodes"));
    }

    #[test]
    fn test_defaults() {
        let config = config(&["-H", "https://prom.example.com/", "-q", "up", "-c", "1:"]).unwrap();
        assert_eq!(config.endpoint, "https://prom.example.com");
        assert_eq!(config.thresholds.warning, None);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.empty_result, ServiceState::Unknown);
        assert_eq!(config.name, None);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            config(&["-H", "http://", "-q", "up", "-w", "1"]),
            Err(ConfigError::InvalidHost { .. })
        ));
        assert!(matches!(
            config(&["-H", "https://", "-q", "up", "-w", "1"]),
            Err(ConfigError::InvalidHost { .. })
        ));
        assert!(matches!(
            config(&["-H", "ftp://my.host", "-q", "up", "-w", "1"]),
            Err(ConfigError::InvalidHost { .. })
        ));
        assert!(matches!(
            config(&["-H", "bad host name", "-q", "up", "-w", "1"]),
            Err(ConfigError::InvalidHost { .. })
        ));
        assert_eq!(
            config(&["-H", "h", "-q", "  ", "-w", "1"]),
            Err(ConfigError::EmptyQuery)
        );
        assert_eq!(
            config(&["-H", "h", "-q", "up", "-w", "1", "-t", "0"]),
            Err(ConfigError::ZeroTimeout)
        );
    }
}
