use crate::config::{Config, TargetOverrides};
use ipcsniff_common::target::TargetDescriptor;
use ipcsniff_extracts::process::ProcessRegistry;
use ipcsniff_extracts::version::{
    InstallDirStrategy, LoadedModuleStrategy, ProcMapsModuleEnumerator, ResolutionError,
    ResolvedBinary, VersionResolver,
};
use tracing::info;

/// Running processes first, then the install directory.
pub fn default_resolver(config: &Config, registry: &ProcessRegistry) -> VersionResolver {
    VersionResolver::new(&config.module_file_name)
        .with_strategy(LoadedModuleStrategy::new(
            registry.running_pids(),
            ProcMapsModuleEnumerator,
            &config.module_file_name,
        ))
        .with_strategy(InstallDirStrategy::new(
            &config.install_dir,
            &config.module_file_name,
        ))
}

/// Builds the target for this run. The resolver only runs when the overrides
/// leave something to look up.
pub fn build_target(
    config: &Config,
    overrides: &TargetOverrides,
    resolver: &VersionResolver,
) -> Result<TargetDescriptor, ResolutionError> {
    let process_name = overrides.process_name(config);
    let channel_name = overrides.channel_name(config);

    if overrides.is_fully_custom() {
        let version = overrides.version.as_deref().unwrap_or_default();
        info!(
            "Using custom target {} {} on channel {}",
            process_name, version, channel_name
        );
        return Ok(TargetDescriptor::custom(process_name, version, channel_name));
    }

    let ResolvedBinary { path, version } = resolver.resolve()?;
    let version = overrides.version.clone().unwrap_or(version);
    info!(
        "Resolved target {} version {:?} at {}",
        process_name,
        version,
        path.display()
    );
    Ok(TargetDescriptor::resolved(
        process_name,
        version,
        channel_name,
        path,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use serial_test::serial;
    use tempfile::TempDir;

    fn config_with_install_dir(tmp: &TempDir, install_dir: &std::path::Path) -> Config {
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            format!(
                "install_dir = {:?}\nmodule_file_name = \"chrome\"\n",
                install_dir.display().to_string()
            ),
        )
        .unwrap();
        ConfigLoader::load_config(Some(&path)).unwrap()
    }

    fn install(root: &std::path::Path, version: &str) {
        let dir = root.join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("chrome"), b"").unwrap();
    }

    fn resolver_for(config: &Config) -> VersionResolver {
        VersionResolver::new(&config.module_file_name).with_strategy(InstallDirStrategy::new(
            &config.install_dir,
            &config.module_file_name,
        ))
    }

    #[test]
    #[serial]
    fn test_resolves_from_install_dir() {
        let tmp = TempDir::new().unwrap();
        let install_dir = tmp.path().join("Application");
        install(&install_dir, "89.0.4389.90");
        install(&install_dir, "90.0.4430.85");
        let config = config_with_install_dir(&tmp, &install_dir);

        let target =
            build_target(&config, &TargetOverrides::default(), &resolver_for(&config)).unwrap();

        assert_eq!(target.resolved_version(), "90.0.4430.85");
        assert_eq!(target.capture_channel_name(), "chromiumipc");
        assert!(!target.is_custom());
    }

    #[test]
    #[serial]
    fn test_partial_overrides_keep_resolution() {
        let tmp = TempDir::new().unwrap();
        let install_dir = tmp.path().join("Application");
        install(&install_dir, "90.0.4430.85");
        let config = config_with_install_dir(&tmp, &install_dir);
        let overrides = TargetOverrides {
            channel_name: Some("edgeipc".into()),
            version: Some("91.0".into()),
            ..Default::default()
        };

        let target = build_target(&config, &overrides, &resolver_for(&config)).unwrap();

        assert_eq!(target.process_name_pattern(), "chrome");
        assert_eq!(target.capture_channel_name(), "edgeipc");
        assert_eq!(target.resolved_version(), "91.0");
        assert!(target.binary_path().is_some());
    }

    #[test]
    #[serial]
    fn test_fully_custom_skips_lookup() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_install_dir(&tmp, &tmp.path().join("missing"));
        let overrides = TargetOverrides {
            process_name: Some("msedge".into()),
            channel_name: Some("edgeipc".into()),
            version: Some("120.0.2210.91".into()),
        };

        let target = build_target(&config, &overrides, &resolver_for(&config)).unwrap();

        assert!(target.is_custom());
        assert_eq!(target.process_name_pattern(), "msedge");
    }

    #[test]
    #[serial]
    fn test_nothing_found_is_a_resolution_error() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_install_dir(&tmp, &tmp.path().join("missing"));

        let err = build_target(&config, &TargetOverrides::default(), &resolver_for(&config))
            .unwrap_err();

        assert!(err.to_string().starts_with("Could not find chrome"));
    }
}
