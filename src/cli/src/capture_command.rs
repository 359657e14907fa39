use crate::commands::CaptureArgs;
use crate::config::{Config, TargetOverrides};
use crate::target_setup::{build_target, default_resolver};
use anyhow::Result;
use ipcsniff_capture::metadata::{CachedInterfaceMetadata, GitTagLookup, InterfaceMetadataService};
use ipcsniff_capture::presentation::{register_legend, LegendOutcome};
use ipcsniff_capture::{
    CaptureChannelReader, CaptureSession, CapturedFrame, StatsSnapshot, StopSignal,
    UnixSocketReader,
};
use ipcsniff_common::target::{CaptureFilter, TargetDescriptor};
use ipcsniff_common::workdir::SNIFFER_WORK_DIR;
use ipcsniff_common::{info_message, success_message, warning_message, Colorize};
use ipcsniff_extracts::channels::ProcFdEnumerator;
use ipcsniff_extracts::process::{ProcessRegistry, SysinfoProcessSource};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataStatus {
    Current,
    Skipped,
    /// Cache holds another version than the target.
    Stale { cached: String },
    Failed(String),
}

pub fn monitored_registry(config: &Config, process_name: &str) -> Arc<ProcessRegistry> {
    Arc::new(
        ProcessRegistry::new(process_name, Arc::new(SysinfoProcessSource::new()))
            .with_refresh_timeout(config.registry_refresh_timeout()),
    )
}

pub fn capture_filter(config: &Config, args: &CaptureArgs) -> CaptureFilter {
    let namespace = if args.only_mojo {
        config.namespace_filter.clone()
    } else {
        String::new()
    };
    CaptureFilter::new(namespace, args.only_new_mojo_pipes)
}

/// Refreshes every interface cache; the first one that is not current
/// decides the status.
pub async fn sync_interface_metadata(
    services: &[&dyn InterfaceMetadataService],
    target: &TargetDescriptor,
    force: bool,
) -> MetadataStatus {
    if !target.is_versioned() {
        return MetadataStatus::Skipped;
    }
    let mut status = MetadataStatus::Current;
    for service in services {
        let refreshed = match service.refresh_if_stale(target.resolved_version(), force).await {
            Ok(cached) if cached == target.resolved_version() => MetadataStatus::Current,
            Ok(cached) => MetadataStatus::Stale { cached },
            Err(e) => MetadataStatus::Failed(format!("{e:#}")),
        };
        if status == MetadataStatus::Current {
            status = refreshed;
        }
    }
    status
}

fn report_metadata(status: &MetadataStatus, target: &TargetDescriptor) {
    match status {
        MetadataStatus::Current => {
            info_message!("Interface metadata matches version {}", target.resolved_version())
        }
        MetadataStatus::Skipped => {
            info_message!("Target version unknown, skipping interface metadata update")
        }
        MetadataStatus::Stale { cached } if cached.is_empty() => warning_message!(
            "No interface metadata available; decoded interface names may be missing"
        ),
        MetadataStatus::Stale { cached } => warning_message!(
            "Interface metadata is for version {} but the target runs {}; decoded interface names may be wrong",
            cached,
            target.resolved_version()
        ),
        MetadataStatus::Failed(e) => warning_message!("Could not update interface metadata: {}", e),
    }
}

fn configure_legend(colorfilters_file: Option<&Path>) {
    let Some(path) = colorfilters_file else {
        debug!("no color filter file configured");
        return;
    };
    match register_legend(path) {
        Ok(LegendOutcome::Registered) => success_message!("Configured analyzer protocol colors"),
        Ok(LegendOutcome::AlreadyPresent) => debug!("analyzer colors already configured"),
        Ok(LegendOutcome::FileMissing) => warning_message!(
            "Could not find color filter file {}, skipping color configuration",
            path.display()
        ),
        Err(e) => warning_message!("Could not edit color filters, skipping: {:#}", e),
    }
}

fn spawn_interrupt_listener(stop: StopSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for interrupts: {}", e);
                return;
            }
            if stop.trigger() {
                info_message!("Stopping capture...");
            }
        }
    })
}

fn spawn_registry_refresher(
    registry: Arc<ProcessRegistry>,
    stop: StopSignal,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick fires immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = stop.triggered() => break,
                _ = ticker.tick() => {
                    let snapshot = registry.refresh().await;
                    debug!("{} monitored processes running", snapshot.running_pids().len());
                }
            }
        }
    })
}

/// Waits for a helper task, logging instead of hiding a panic. Returns
/// whether the task finished cleanly.
async fn join_logged(task: JoinHandle<()>, name: &str) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) if e.is_cancelled() => {
            debug!("{} task was cancelled", name);
            true
        }
        Err(e) => {
            warn!("{} task failed: {}", name, e);
            false
        }
    }
}

fn print_frame(frame: &CapturedFrame) {
    let pid = frame
        .pid
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!(
        "{} {:>7} {:<20} {} ({} bytes)",
        frame.received_at.format("%H:%M:%S%.3f"),
        pid,
        frame.category().unwrap_or("-"),
        frame.channel,
        frame.payload.len()
    );
}

/// Prints delivered frames until delivery ends, then drains what is queued.
async fn consume_frames<R: CaptureChannelReader>(
    session: Arc<CaptureSession<R>>,
    mut frames: mpsc::Receiver<CapturedFrame>,
) {
    loop {
        tokio::select! {
            biased;
            frame = frames.recv() => match frame {
                Some(frame) => print_frame(&frame),
                None => return,
            },
            _ = session.delivery_ended() => break,
        }
    }
    while let Ok(frame) = frames.try_recv() {
        print_frame(&frame);
    }
}

fn report_summary(stats: StatsSnapshot) {
    success_message!(
        "Capture finished: {} frames delivered, {} filtered ({} on pre-existing channels, {} outside the namespace filter)",
        stats.delivered,
        stats.dropped_pre_existing + stats.dropped_namespace,
        stats.dropped_pre_existing,
        stats.dropped_namespace
    );
}

pub async fn run_capture(config: &Config, args: &CaptureArgs) -> Result<()> {
    let overrides = TargetOverrides::from_args(&args.target)?;

    let registry = monitored_registry(config, overrides.process_name(config));
    let snapshot = registry.refresh().await;
    info_message!(
        "Found {} running {} processes",
        snapshot.running_pids().len(),
        registry.monitored_name()
    );

    let target = build_target(config, &overrides, &default_resolver(config, &registry))?;
    match target.binary_path() {
        Some(path) => success_message!(
            "Target {} version {} ({})",
            target.process_name_pattern(),
            if target.is_versioned() { target.resolved_version() } else { "unknown" },
            path.display()
        ),
        None => success_message!(
            "Using custom target {} version {}",
            target.process_name_pattern(),
            target.resolved_version()
        ),
    }

    let lookup: Arc<GitTagLookup> = Arc::new(GitTagLookup::new(&config.metadata_endpoint));
    let mojo = CachedInterfaceMetadata::new(&config.metadata_cache_file, lookup.clone());
    let legacy_ipc = CachedInterfaceMetadata::new(&config.legacy_ipc_metadata_cache_file, lookup);
    let status =
        sync_interface_metadata(&[&mojo, &legacy_ipc], &target, args.update_interfaces_info).await;
    report_metadata(&status, &target);

    configure_legend(config.colorfilters_path().as_deref());

    let stop = StopSignal::new();
    let interrupts = spawn_interrupt_listener(stop.clone());

    let reader = Arc::new(UnixSocketReader::new(SNIFFER_WORK_DIR.clone()));
    info_message!(
        "Waiting for the producer on {}",
        reader.socket_path(target.capture_channel_name()).display()
    );

    let (sink, frames) = mpsc::channel(config.frame_queue_capacity);
    let session = Arc::new(
        CaptureSession::new(
            target.clone(),
            capture_filter(config, args),
            reader,
            registry.clone(),
            Arc::new(ProcFdEnumerator),
            sink,
        )
        .with_handshake_timeout(config.handshake_timeout()),
    );

    let stopper = {
        let session = session.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            stop.triggered().await;
            session.stop().await;
        })
    };

    let started = session.start().await?;
    if !started {
        let interrupted = stop.is_triggered();
        stop.trigger();
        join_logged(stopper, "session stopper").await;
        interrupts.abort();
        if interrupted {
            info_message!("Capture cancelled before the producer connected");
        } else {
            warning_message!(
                "Could not start capture on channel {}",
                target.capture_channel_name()
            );
        }
        return Ok(());
    }

    success_message!(
        "Capturing on channel {}. Press Ctrl+C to stop.",
        target.capture_channel_name()
    );

    let refresher =
        spawn_registry_refresher(registry, stop.clone(), config.registry_refresh_interval());
    let consumer = tokio::spawn(consume_frames(session.clone(), frames));

    tokio::select! {
        _ = stop.triggered() => {}
        _ = session.delivery_ended() => info!("capture channel closed"),
    }
    stop.trigger();

    join_logged(stopper, "session stopper").await;
    session.stop().await;
    join_logged(consumer, "frame consumer").await;
    join_logged(refresher, "registry refresher").await;
    interrupts.abort();

    report_summary(session.stats().snapshot());
    Ok(())
}
