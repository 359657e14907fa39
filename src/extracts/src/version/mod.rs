//! Locating the monitored binary on disk and deriving its version.
//!
//! Strategies are tried in order and the first path that exists wins. When
//! all of them come up empty the caller gets a [`ResolutionError`], which is
//! fatal for the run but left to the entry point to act on.

pub mod dotted;
pub mod install_dir;
pub mod loaded_module;

pub use dotted::DottedVersion;
pub use install_dir::InstallDirStrategy;
pub use loaded_module::{LoadedModuleStrategy, ModuleEnumerator, ProcMapsModuleEnumerator};

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One way of finding the monitored binary.
pub trait VersionResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn locate(&self) -> Option<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinary {
    pub path: PathBuf,
    /// Empty when the parent directory isn't named like a version.
    pub version: String,
}

impl ResolvedBinary {
    pub fn from_path(path: PathBuf) -> Self {
        let version = version_from_install_layout(&path).unwrap_or_default();
        Self { path, version }
    }
}

/// Install layouts keep each build in a directory named after its version,
/// so the binary's parent directory name is the version.
pub fn version_from_install_layout(path: &Path) -> Option<String> {
    let dir_name = path.parent()?.file_name()?.to_string_lossy().to_string();
    match dir_name.parse::<DottedVersion>() {
        Ok(_) => Some(dir_name),
        Err(_) => {
            debug!(
                "parent directory {:?} of {} is not a version",
                dir_name,
                path.display()
            );
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    BinaryNotFound {
        module_file_name: String,
        tried: Vec<&'static str>,
    },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::BinaryNotFound {
                module_file_name,
                tried,
            } => write!(
                f,
                "Could not find {} (tried: {}). Aborting.",
                module_file_name,
                tried.join(", ")
            ),
        }
    }
}

impl std::error::Error for ResolutionError {}

pub struct VersionResolver {
    module_file_name: String,
    strategies: Vec<Box<dyn VersionResolutionStrategy>>,
}

impl VersionResolver {
    pub fn new(module_file_name: impl Into<String>) -> Self {
        Self {
            module_file_name: module_file_name.into(),
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl VersionResolutionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn resolve(&self) -> Result<ResolvedBinary, ResolutionError> {
        for strategy in &self.strategies {
            match strategy.locate() {
                Some(path) if path.is_file() => {
                    info!("{} resolved via {}", path.display(), strategy.name());
                    return Ok(ResolvedBinary::from_path(path));
                }
                Some(path) => debug!(
                    "{} reported {} but it does not exist",
                    strategy.name(),
                    path.display()
                ),
                None => debug!("{} found nothing", strategy.name()),
            }
        }

        Err(ResolutionError::BinaryNotFound {
            module_file_name: self.module_file_name.clone(),
            tried: self.strategies.iter().map(|s| s.name()).collect(),
        })
    }
}
