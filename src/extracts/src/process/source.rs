use ipcsniff_common::process::{normalize_image_name, ProcessRecord};
use std::sync::Arc;
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Where process records come from. Implementations block and must only be
/// called off the async runtime.
pub trait ProcessSource: Send + Sync {
    /// Lists every visible process. Command lines are only read for
    /// processes named `monitored_name`; processes that can't be read are
    /// left out.
    fn enumerate(&self, monitored_name: &str) -> Vec<ProcessRecord>;
}

/// Reads the OS process table through `sysinfo`.
pub struct SysinfoProcessSource {
    system: Arc<RwLock<System>>,
}

impl SysinfoProcessSource {
    pub fn new() -> Self {
        Self {
            system: Arc::new(RwLock::new(System::new())),
        }
    }
}

impl Default for SysinfoProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoProcessSource {
    fn enumerate(&self, monitored_name: &str) -> Vec<ProcessRecord> {
        let mut sys = self.system.blocking_write();

        // names only for the whole table
        sys.refresh_processes_specifics(ProcessRefreshKind::new());

        let monitored: Vec<Pid> = sys
            .processes()
            .iter()
            .filter(|(_, process)| normalize_image_name(process.name()) == monitored_name)
            .map(|(pid, _)| *pid)
            .collect();

        let mut exited = Vec::new();
        for pid in &monitored {
            let refreshed = sys.refresh_process_specifics(
                *pid,
                ProcessRefreshKind::new().with_cmd(UpdateKind::Always),
            );
            if !refreshed {
                debug!("process {} exited before its command line was read", pid);
                exited.push(*pid);
            }
        }

        sys.processes()
            .iter()
            .filter(|(pid, _)| !exited.contains(pid))
            .map(|(pid, process)| {
                let name = normalize_image_name(process.name());
                let command_line = (name == monitored_name).then(|| process.cmd().join(" "));
                trace!(pid = pid.as_u32(), name = %name, "enumerated process");
                ProcessRecord::new(pid.as_u32(), name, command_line)
            })
            .collect()
    }
}
