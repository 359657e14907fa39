use super::VersionResolutionStrategy;
use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;

/// Lists the files mapped into a running process.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleEnumerator {
    fn loaded_modules(&self, pid: u32) -> Result<Vec<PathBuf>>;
}

/// Reads `/proc/<pid>/maps`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcMapsModuleEnumerator;

impl ModuleEnumerator for ProcMapsModuleEnumerator {
    #[cfg(target_os = "linux")]
    fn loaded_modules(&self, pid: u32) -> Result<Vec<PathBuf>> {
        use anyhow::Context;
        use itertools::Itertools;

        let maps = std::fs::read_to_string(format!("/proc/{pid}/maps"))
            .with_context(|| format!("Failed to read memory maps of process {pid}"))?;
        Ok(parse_maps(&maps).unique().map(PathBuf::from).collect())
    }

    #[cfg(not(target_os = "linux"))]
    fn loaded_modules(&self, pid: u32) -> Result<Vec<PathBuf>> {
        anyhow::bail!("module enumeration is not supported on this platform (pid {pid})")
    }
}

/// Path column of a maps listing; anonymous and pseudo mappings are skipped.
pub fn parse_maps(maps: &str) -> impl Iterator<Item = &str> {
    maps.lines().filter_map(|line| {
        // address perms offset dev inode pathname
        let path = line.splitn(6, char::is_whitespace).nth(5)?.trim();
        let path = path.strip_suffix(" (deleted)").unwrap_or(path);
        path.starts_with('/').then_some(path)
    })
}

/// Scans the modules of every running monitored process and returns the
/// first one whose file name ends with the binary's file name.
///
/// Matching is by name only, so with several installs loaded the first
/// process enumerated decides.
pub struct LoadedModuleStrategy<E> {
    pids: Vec<u32>,
    enumerator: E,
    module_file_name: String,
}

impl<E: ModuleEnumerator> LoadedModuleStrategy<E> {
    pub fn new(pids: Vec<u32>, enumerator: E, module_file_name: impl Into<String>) -> Self {
        Self {
            pids,
            enumerator,
            module_file_name: module_file_name.into(),
        }
    }
}

impl<E: ModuleEnumerator + Send + Sync> VersionResolutionStrategy for LoadedModuleStrategy<E> {
    fn name(&self) -> &'static str {
        "loaded modules"
    }

    fn locate(&self) -> Option<PathBuf> {
        self.pids.iter().find_map(|pid| {
            let modules = self
                .enumerator
                .loaded_modules(*pid)
                .inspect_err(|e| debug!("skipping process {}: {:#}", pid, e))
                .ok()?;

            modules.into_iter().find(|module| {
                module
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().ends_with(&self.module_file_name))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_parse_maps_keeps_file_backed_paths() {
        let maps = "\
55d0c0a00000-55d0c0a9b000 r--p 00000000 08:01 1311 /opt/google/chrome/chrome
7f1c2a000000-7f1c2a021000 rw-p 00000000 00:00 0
7f1c2b000000-7f1c2b001000 r--p 00000000 08:01 2222 /usr/lib/libc.so.6 (deleted)
7ffd5e7fe000-7ffd5e800000 r-xp 00000000 00:00 0                          [vdso]
";
        let paths: Vec<&str> = parse_maps(maps).collect();
        assert_eq!(paths, vec!["/opt/google/chrome/chrome", "/usr/lib/libc.so.6"]);
    }

    #[test]
    fn test_first_process_exposing_module_wins() {
        let mut enumerator = MockModuleEnumerator::new();
        enumerator
            .expect_loaded_modules()
            .with(eq(10))
            .returning(|_| anyhow::bail!("access denied"));
        enumerator.expect_loaded_modules().with(eq(20)).returning(|_| {
            Ok(vec![
                PathBuf::from("C:/Windows/System32/ntdll.dll"),
                PathBuf::from("C:/Chrome/Application/90.0.2.1/chrome.dll"),
            ])
        });
        enumerator
            .expect_loaded_modules()
            .with(eq(30))
            .never();

        let strategy = LoadedModuleStrategy::new(vec![10, 20, 30], enumerator, "chrome.dll");
        assert_eq!(
            strategy.locate(),
            Some(PathBuf::from("C:/Chrome/Application/90.0.2.1/chrome.dll"))
        );
    }

    #[test]
    fn test_no_process_exposes_module() {
        let mut enumerator = MockModuleEnumerator::new();
        enumerator
            .expect_loaded_modules()
            .returning(|_| Ok(vec![PathBuf::from("/usr/lib/libc.so.6")]));

        let strategy = LoadedModuleStrategy::new(vec![1, 2], enumerator, "chrome.dll");
        assert_eq!(strategy.locate(), None);
    }

    #[test]
    fn test_no_running_processes() {
        let enumerator = MockModuleEnumerator::new();
        let strategy = LoadedModuleStrategy::new(vec![], enumerator, "chrome.dll");
        assert_eq!(strategy.locate(), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_proc_maps_of_current_process() {
        let modules = ProcMapsModuleEnumerator
            .loaded_modules(std::process::id())
            .unwrap();
        assert!(!modules.is_empty());
    }
}
