use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[clap(
    name = "ipcsniff",
    about = "Captures IPC traffic of a running Chromium-based browser",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Path to a TOML config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// `capture` with default flags when no subcommand is given.
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Capture(CaptureArgs::default()))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve the target, prepare the capture channel and stream frames until interrupted
    Capture(CaptureArgs),

    /// List the running monitored processes and their roles
    Processes(TargetArgs),

    /// Print the resolved binary path and version
    Resolve(TargetArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CaptureArgs {
    /// Only capture frames on channels or roles matching the namespace filter
    #[clap(long)]
    pub only_mojo: bool,

    /// Drop frames on channels that were already open when capture started
    #[clap(long)]
    pub only_new_mojo_pipes: bool,

    /// Refresh the interface metadata even if it matches the resolved version
    #[clap(long)]
    pub update_interfaces_info: bool,

    #[clap(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Monitor processes with this image name instead of the configured one
    #[clap(long)]
    pub custom_process_name: Option<String>,

    /// Name of the capture channel to create
    #[clap(long)]
    pub custom_ipc_name: Option<String>,

    /// Use this version instead of the one derived from the install layout
    #[clap(long)]
    pub custom_chromium_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_capture() {
        let cli = Cli::try_parse_from(["ipcsniff"]).unwrap();
        assert!(matches!(cli.command(), Commands::Capture(args) if !args.only_mojo));
    }

    #[test]
    fn test_capture_flags() {
        let cli = Cli::try_parse_from([
            "ipcsniff",
            "capture",
            "--only-mojo",
            "--only-new-mojo-pipes",
            "--custom-ipc-name",
            "edgeipc",
        ])
        .unwrap();

        let Commands::Capture(args) = cli.command() else {
            panic!("expected capture");
        };
        assert!(args.only_mojo);
        assert!(args.only_new_mojo_pipes);
        assert!(!args.update_interfaces_info);
        assert_eq!(args.target.custom_ipc_name.as_deref(), Some("edgeipc"));
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["ipcsniff", "resolve", "--config", "/tmp/x.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
    }
}
