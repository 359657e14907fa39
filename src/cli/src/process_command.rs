use crate::capture_command::run_capture;
use crate::commands::{Cli, Commands};
use crate::config::{ConfigError, ConfigLoader};
use crate::inspect_commands::{print_processes, print_resolution};
use crate::logging::setup_logging;
use anyhow::{Context, Result};
use clap::Parser;
use ipcsniff_common::workdir::SNIFFER_WORK_DIR;
use ipcsniff_common::{error_message, warning_message, Colorize};
use ipcsniff_extracts::version::ResolutionError;
use std::process::ExitCode;

const EXIT_FAILURE: u8 = 1;
const EXIT_RESOLUTION_FAILED: u8 = 2;
const EXIT_CONFIG_INVALID: u8 = 3;

pub fn exit_status_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ResolutionError>().is_some() {
        EXIT_RESOLUTION_FAILED
    } else if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_CONFIG_INVALID
    } else {
        EXIT_FAILURE
    }
}

pub fn process_cli() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error_message!("{:#}", e);
            tracing::error!("{:#}", e);
            ExitCode::from(exit_status_for(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::load_config(cli.config.as_deref())?;

    if let Err(e) = setup_logging(&SNIFFER_WORK_DIR, &config.log_level) {
        warning_message!("Failed to set up logging: {:#}", e);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        match cli.command() {
            Commands::Capture(args) => run_capture(&config, &args).await,
            Commands::Processes(args) => print_processes(&config, &args).await,
            Commands::Resolve(args) => print_resolution(&config, &args).await,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let resolution = anyhow::Error::from(ResolutionError::BinaryNotFound {
            module_file_name: "chrome".into(),
            tried: vec!["install directory"],
        });
        assert_eq!(exit_status_for(&resolution), 2);

        let config = anyhow::Error::from(ConfigError::Load("bad".into())).context("loading");
        assert_eq!(exit_status_for(&config), 3);

        assert_eq!(exit_status_for(&anyhow::anyhow!("other")), 1);
    }
}
