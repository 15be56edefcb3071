mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ciview_config::Config;
use ciview_core::{Controller, MockPort};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "ciview", &mut std::io::stdout());
            Ok(())
        }

        // Endpoint selection doesn't need a controller
        Command::Devices(args) => {
            let config = load_config(&cli.global)?;
            commands::devices::handle(args, &config, &cli.global).await
        }

        cmd => {
            let config = load_config(&cli.global)?;
            let controller = build_controller(&config, &cli.global)?;
            controller.init().await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &controller, &cli.global).await;
            controller.shutdown().await;
            result
        }
    }
}

fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let config = match &global.config {
        Some(path) => ciview_config::load_config_from(path)?,
        None => ciview_config::load_config()?,
    };
    Ok(config)
}

/// Wire a controller to the mock engine, applying CLI overrides.
fn build_controller(config: &Config, global: &GlobalOpts) -> Result<Controller, CliError> {
    let mut mock = config.mock_config()?;
    if let Some(delay) = global.delay_ms {
        mock.response_delay = Duration::from_millis(delay);
    }
    Ok(Controller::new(
        config.controller_config(),
        Arc::new(MockPort::new(mock)),
    ))
}
