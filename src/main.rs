use std::process;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use check_prometheus::check::{run_check, CheckError};
use check_prometheus::cli::Cli;
use check_prometheus::config::CheckConfig;
use check_prometheus::config_generator::print_icinga_command_config_if_env_and_exit;
use check_prometheus::prometheus::PrometheusClient;
use check_prometheus::{Report, Runner, ServiceState};

fn main() {
    if let Err(err) = print_icinga_command_config_if_env_and_exit("prometheus", &Cli::command()) {
        println!("{}: {}", ServiceState::Unknown, err);
        process::exit(ServiceState::Unknown.exit_code());
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            println!("{}: invalid arguments", ServiceState::Unknown);
            print!("{}", err.render());
            process::exit(ServiceState::Unknown.exit_code());
        }
    };

    init_tracing(cli.verbose);

    let config = match CheckConfig::try_from(cli) {
        Ok(config) => config,
        Err(err) => {
            println!("{}: execution failed: {}", ServiceState::Unknown, err);
            print!("{}", Cli::command().render_help());
            process::exit(ServiceState::Unknown.exit_code());
        }
    };

    Runner::new().safe_run(|| run(config)).print_and_exit()
}

/// Logs go to stderr, stdout belongs to the check result.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,check_prometheus={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(config: CheckConfig) -> Result<Report, CheckError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CheckError::Runtime)?;

    let client = PrometheusClient::builder()
        .endpoint(config.endpoint.as_str())
        .timeout(config.retry.timeout)
        .build()?;

    tracing::info!(endpoint = client.endpoint(), query = %config.query, "Running check");

    let outcome = runtime.block_on(run_check(&client, &config))?;
    let report = Report::from(outcome);

    Ok(match config.name {
        Some(name) => report.with_name(name),
        None => report,
    })
}
