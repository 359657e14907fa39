use crate::process::snapshot::ProcessSnapshot;
use crate::process::source::ProcessSource;
use ipcsniff_common::constants::REGISTRY_REFRESH_TIMEOUT_MS;
use ipcsniff_common::process::{normalize_image_name, ProcessRole};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Holds the current process snapshot and replaces it on every refresh.
///
/// Readers clone the `Arc` of the current snapshot, so they keep a complete
/// table even while a refresh swaps in the next one.
pub struct ProcessRegistry {
    monitored_name: String,
    source: Arc<dyn ProcessSource>,
    current: RwLock<Arc<ProcessSnapshot>>,
    refresh_lock: Mutex<()>,
    refresh_timeout: Duration,
}

impl ProcessRegistry {
    pub fn new(monitored_name: impl AsRef<str>, source: Arc<dyn ProcessSource>) -> Self {
        let monitored_name = normalize_image_name(monitored_name.as_ref());
        Self {
            current: RwLock::new(Arc::new(ProcessSnapshot::empty(monitored_name.clone()))),
            monitored_name,
            source,
            refresh_lock: Mutex::new(()),
            refresh_timeout: Duration::from_millis(REGISTRY_REFRESH_TIMEOUT_MS),
        }
    }

    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    pub fn monitored_name(&self) -> &str {
        &self.monitored_name
    }

    /// Re-enumerates the OS processes and swaps in the new snapshot.
    ///
    /// Never fails. If enumeration stalls past the refresh timeout or the
    /// blocking task dies, the previous snapshot stays current.
    #[tracing::instrument(skip(self), fields(process_name = %self.monitored_name))]
    pub async fn refresh(&self) -> Arc<ProcessSnapshot> {
        let _ordered = self.refresh_lock.lock().await;

        let source = Arc::clone(&self.source);
        let monitored_name = self.monitored_name.clone();
        let enumeration =
            tokio::task::spawn_blocking(move || source.enumerate(&monitored_name));

        match tokio::time::timeout(self.refresh_timeout, enumeration).await {
            Ok(Ok(records)) => {
                let snapshot = Arc::new(ProcessSnapshot::new(self.monitored_name.clone(), records));
                debug!(
                    total = snapshot.len(),
                    monitored = snapshot.running_pids().len(),
                    "process snapshot refreshed"
                );
                *self.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Arc::clone(&snapshot);
                snapshot
            }
            Ok(Err(e)) => {
                warn!("process enumeration task failed: {}", e);
                self.snapshot()
            }
            Err(_) => {
                warn!(
                    "process enumeration took longer than {:?}, keeping previous snapshot",
                    self.refresh_timeout
                );
                self.snapshot()
            }
        }
    }

    pub fn snapshot(&self) -> Arc<ProcessSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_monitored_process(&self, pid: u32) -> bool {
        self.snapshot().is_monitored(pid)
    }

    pub fn running_pids(&self) -> Vec<u32> {
        self.snapshot().running_pids()
    }

    pub fn classify(&self, pid: u32) -> ProcessRole {
        self.snapshot().role_of(pid)
    }
}
