use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one OS process as seen by a single registry refresh.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    /// Only captured for processes carrying the monitored name.
    pub command_line: Option<String>,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: impl AsRef<str>, command_line: Option<String>) -> Self {
        Self {
            pid,
            name: normalize_image_name(name.as_ref()),
            command_line: command_line.filter(|cmd| !cmd.trim().is_empty()),
        }
    }

    pub fn is_named(&self, monitored_name: &str) -> bool {
        self.name == monitored_name
    }
}

/// Strips a trailing `.exe` so names compare the same on every platform.
pub fn normalize_image_name(name: &str) -> String {
    let trimmed = name.trim();
    match trimmed.len().checked_sub(4) {
        Some(cut)
            if trimmed.is_char_boundary(cut) && trimmed[cut..].eq_ignore_ascii_case(".exe") =>
        {
            trimmed[..cut].to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Functional category of a browser process.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    #[default]
    Unknown,
    Broker,
    Renderer,
    Extension,
    Notification,
    Plugin,
    Worker,
    Ncal,
    GpuProcess,
    Watcher,
    ServiceWorker,
    NetworkService,
    AudioService,
    ContentDecryptionModuleService,
    CrashpadHandler,
    PpapiBroker,
}

impl ProcessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Unknown => "unknown",
            ProcessRole::Broker => "broker",
            ProcessRole::Renderer => "renderer",
            ProcessRole::Extension => "extension",
            ProcessRole::Notification => "notification",
            ProcessRole::Plugin => "plugin",
            ProcessRole::Worker => "worker",
            ProcessRole::Ncal => "ncal",
            ProcessRole::GpuProcess => "gpu-process",
            ProcessRole::Watcher => "watcher",
            ProcessRole::ServiceWorker => "service-worker",
            ProcessRole::NetworkService => "network-service",
            ProcessRole::AudioService => "audio-service",
            ProcessRole::ContentDecryptionModuleService => "cdm-service",
            ProcessRole::CrashpadHandler => "crashpad-handler",
            ProcessRole::PpapiBroker => "ppapi-broker",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
