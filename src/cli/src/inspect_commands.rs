use crate::capture_command::monitored_registry;
use crate::commands::TargetArgs;
use crate::config::{Config, TargetOverrides};
use crate::target_setup::{build_target, default_resolver};
use anyhow::Result;
use ipcsniff_common::{info_message, success_message, Colorize};

pub async fn print_processes(config: &Config, args: &TargetArgs) -> Result<()> {
    let overrides = TargetOverrides::from_args(args)?;
    let registry = monitored_registry(config, overrides.process_name(config));
    let snapshot = registry.refresh().await;

    let mut pids = snapshot.running_pids();
    if pids.is_empty() {
        info_message!("No running {} processes", registry.monitored_name());
        return Ok(());
    }
    pids.sort_unstable();

    success_message!(
        "{} running {} processes at {}",
        pids.len(),
        registry.monitored_name(),
        snapshot.taken_at().format("%H:%M:%S")
    );
    for pid in pids {
        println!("{:>8}  {}", pid, snapshot.role_of(pid));
    }
    Ok(())
}

pub async fn print_resolution(config: &Config, args: &TargetArgs) -> Result<()> {
    let overrides = TargetOverrides::from_args(args)?;
    let registry = monitored_registry(config, overrides.process_name(config));
    registry.refresh().await;

    let target = build_target(config, &overrides, &default_resolver(config, &registry))?;

    match target.binary_path() {
        Some(path) => println!("Binary:  {}", path.display()),
        None => println!("Binary:  (custom target, not looked up)"),
    }
    let version = if target.is_versioned() {
        target.resolved_version()
    } else {
        "unknown"
    };
    println!("Version: {}", version);
    println!("Process: {}", target.process_name_pattern());
    println!("Channel: {}", target.capture_channel_name());
    Ok(())
}
