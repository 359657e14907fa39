use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const WORK_DIR_NAME: &str = "ipcsniff";
const LOG_FILE: &str = "sniffer.log";
const METADATA_CACHE_FILE: &str = crate::constants::METADATA_CACHE_FILE;
const LEGACY_IPC_METADATA_CACHE_FILE: &str = crate::constants::LEGACY_IPC_METADATA_CACHE_FILE;

pub static SNIFFER_WORK_DIR: LazyLock<SnifferWorkDir> =
    LazyLock::new(|| SnifferWorkDir::under(std::env::temp_dir()));

/// Files the sniffer keeps between runs.
#[derive(Debug, Clone)]
pub struct SnifferWorkDir {
    pub path: PathBuf,
    pub log_file: PathBuf,
    /// Mojo interface cache.
    pub metadata_cache_file: PathBuf,
    pub legacy_ipc_metadata_cache_file: PathBuf,
}

impl SnifferWorkDir {
    pub fn under(base: impl AsRef<Path>) -> Self {
        let path = base.as_ref().join(WORK_DIR_NAME);
        Self {
            log_file: path.join(LOG_FILE),
            metadata_cache_file: path.join(METADATA_CACHE_FILE),
            legacy_ipc_metadata_cache_file: path.join(LEGACY_IPC_METADATA_CACHE_FILE),
            path,
        }
    }

    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("Failed to create work dir {}", self.path.display()))
    }

    /// Path of the local socket backing the named capture channel.
    pub fn channel_socket(&self, channel_name: &str) -> PathBuf {
        self.path.join(format!("{channel_name}.sock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_live_under_work_dir() {
        let tmp = std::env::temp_dir().join("ipcsniff-workdir-test");
        let work_dir = SnifferWorkDir::under(&tmp);
        assert!(work_dir.log_file.starts_with(&work_dir.path));
        assert_ne!(
            work_dir.metadata_cache_file,
            work_dir.legacy_ipc_metadata_cache_file
        );
        assert_eq!(
            work_dir.channel_socket("chromiumipc"),
            tmp.join("ipcsniff").join("chromiumipc.sock")
        );
    }
}
