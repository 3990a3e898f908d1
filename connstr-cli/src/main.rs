use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use connstr_cli::{execute, Cli};
use logger_redacted::LoggerConfig;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_TARGETS: [&str; 4] = ["connstr", "connstr_cli", "webconfig_engine", "connection_settings"];

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("{} failed to initialise logging: {}", "warning:".yellow(), e);
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<bool> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out).await
}

/// Logs go to stderr so command output stays pipeable. Plain text on a
/// terminal, JSON otherwise.
fn init_tracing(verbose: bool) -> Result<()> {
    let interactive = std::env::var("NO_COLOR").is_err() && atty::is(atty::Stream::Stderr);
    let logger = LoggerConfig::default().verbose(verbose).with_json_output(!interactive);
    colored::control::set_override(atty::is(atty::Stream::Stdout) && std::env::var("NO_COLOR").is_err());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logger.filter_directive(&LOG_TARGETS)));

    if logger.json_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(verbose)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(true)
                    .with_writer(io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
