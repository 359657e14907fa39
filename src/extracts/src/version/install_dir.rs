use super::{DottedVersion, VersionResolutionStrategy};
use itertools::Itertools;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Looks for `<install_dir>/<version>/<module_file_name>`, newest version
/// first.
pub struct InstallDirStrategy {
    install_dir: PathBuf,
    module_file_name: String,
}

impl InstallDirStrategy {
    pub fn new(install_dir: impl Into<PathBuf>, module_file_name: impl Into<String>) -> Self {
        Self {
            install_dir: install_dir.into(),
            module_file_name: module_file_name.into(),
        }
    }

    fn versions_descending(&self) -> Vec<(DottedVersion, PathBuf)> {
        let entries = match std::fs::read_dir(&self.install_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("cannot read {}: {}", self.install_dir.display(), e);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.inspect_err(|e| warn!("skipping entry: {}", e)).ok())
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.parse::<DottedVersion>()
                    .ok()
                    .map(|version| (version, entry.path()))
            })
            .sorted_by(|(a, _), (b, _)| b.cmp(a))
            .collect()
    }
}

impl VersionResolutionStrategy for InstallDirStrategy {
    fn name(&self) -> &'static str {
        "install directory"
    }

    fn locate(&self) -> Option<PathBuf> {
        self.versions_descending()
            .into_iter()
            .map(|(_, dir)| dir.join(&self.module_file_name))
            .find(|candidate| {
                let exists = candidate.is_file();
                if !exists {
                    debug!("{} does not exist", candidate.display());
                }
                exists
            })
    }
}
