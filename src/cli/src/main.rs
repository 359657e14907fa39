use ipcsniff_cli::process_command::process_cli;
use std::process::ExitCode;

pub fn main() -> ExitCode {
    process_cli()
}
