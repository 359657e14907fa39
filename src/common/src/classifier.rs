//! Role classification from raw command lines.
//!
//! Markers are matched as plain substrings anywhere in the command line, in a
//! fixed priority order where the first hit wins. Several markers routinely
//! co-occur (an extension host is also launched with `--type=renderer`), so
//! the order is part of the contract.

use crate::constants::{
    CDM_SERVICE_MARKER, DISABLE_DATABASES_MARKER, EXTENSION_PROCESS_MARKER, GPU_PROCESS_MARKER,
    NETWORK_SERVICE_MARKER, PROCESS_TYPE_MARKER, RENDERER_MARKER, WATCHER_MARKER,
};
use crate::process::{normalize_image_name, ProcessRecord, ProcessRole};

/// Maps a record to its role. Returns [`ProcessRole::Unknown`] for records
/// that don't carry the monitored name or have no command line.
///
/// `monitored_name` may be given with or without its `.exe` suffix.
pub fn classify(record: &ProcessRecord, monitored_name: &str) -> ProcessRole {
    if !record.is_named(&normalize_image_name(monitored_name)) {
        return ProcessRole::Unknown;
    }
    match record.command_line.as_deref() {
        Some(command_line) if !command_line.is_empty() => classify_command_line(command_line),
        _ => ProcessRole::Unknown,
    }
}

pub fn classify_command_line(command_line: &str) -> ProcessRole {
    let has = |marker: &str| command_line.contains(marker);

    if !has(PROCESS_TYPE_MARKER) {
        ProcessRole::Broker
    } else if has(EXTENSION_PROCESS_MARKER) && !has(DISABLE_DATABASES_MARKER) {
        ProcessRole::Extension
    } else if has(WATCHER_MARKER) {
        ProcessRole::Watcher
    } else if has(NETWORK_SERVICE_MARKER) {
        ProcessRole::NetworkService
    } else if has(CDM_SERVICE_MARKER) {
        ProcessRole::ContentDecryptionModuleService
    } else if has(GPU_PROCESS_MARKER) {
        ProcessRole::GpuProcess
    } else if has(RENDERER_MARKER) {
        ProcessRole::Renderer
    } else {
        ProcessRole::Unknown
    }
}
