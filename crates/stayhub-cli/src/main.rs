//! Stayhub - listing directory command-line tool.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stayhub_cli::{run, Args, CliError};

fn main() {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stayhub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let (config, command) = args.into_config();

    tracing::debug!(
        data_path = %config.data_path.display(),
        principal = %config.principal,
        "configuration loaded"
    );

    let result = run(config, command)
        .and_then(|output| serde_json::to_string_pretty(&output).map_err(CliError::from));
    match result {
        Ok(text) => println!("{}", text),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
