use crate::commands::TargetArgs;
use config::{Config as RConfig, Environment, File};
use ipcsniff_common::constants::{
    CONFIG_FILE_NAME, DEFAULT_CHANNEL_NAME, DEFAULT_MODULE_FILE_NAME, DEFAULT_NAMESPACE_FILTER,
    DEFAULT_PROCESS_NAME, ENV_PREFIX, FRAME_QUEUE_CAPACITY, HANDSHAKE_TIMEOUT_MS,
    METADATA_ENDPOINT, REGISTRY_REFRESH_INTERVAL_MS, REGISTRY_REFRESH_TIMEOUT_MS,
};
use ipcsniff_common::workdir::SNIFFER_WORK_DIR;
use ipcsniff_extracts::version::DottedVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub process_name: String,
    pub channel_name: String,
    pub module_file_name: String,
    pub install_dir: PathBuf,
    pub namespace_filter: String,
    pub handshake_timeout_ms: u64,
    pub registry_refresh_interval_ms: u64,
    pub registry_refresh_timeout_ms: u64,
    pub frame_queue_capacity: usize,
    pub metadata_cache_file: PathBuf,
    pub legacy_ipc_metadata_cache_file: PathBuf,
    pub metadata_endpoint: String,
    /// Analyzer color-filter file; empty skips legend registration.
    pub colorfilters_file: String,
    pub log_level: String,
}

impl Config {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn registry_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.registry_refresh_interval_ms)
    }

    pub fn registry_refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_refresh_timeout_ms)
    }

    pub fn colorfilters_path(&self) -> Option<PathBuf> {
        (!self.colorfilters_file.trim().is_empty()).then(|| PathBuf::from(&self.colorfilters_file))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_process_name("process_name", &self.process_name)?;
        validate_channel_name("channel_name", &self.channel_name)?;
        require_non_empty("module_file_name", &self.module_file_name)?;
        for (key, value) in [
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("registry_refresh_interval_ms", self.registry_refresh_interval_ms),
            ("registry_refresh_timeout_ms", self.registry_refresh_timeout_ms),
            ("frame_queue_capacity", self.frame_queue_capacity as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Load(String),
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "Failed to load configuration: {}", msg),
            ConfigError::Invalid { key, reason } => write!(f, "Invalid {}: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

fn require_non_empty(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(key, "must not be empty"));
    }
    Ok(())
}

fn validate_process_name(key: &'static str, value: &str) -> Result<(), ConfigError> {
    require_non_empty(key, value)?;
    if value.contains(['/', '\\']) {
        return Err(ConfigError::invalid(
            key,
            format!("'{value}' must be an image name, not a path"),
        ));
    }
    Ok(())
}

fn validate_channel_name(key: &'static str, value: &str) -> Result<(), ConfigError> {
    require_non_empty(key, value)?;
    if value.contains(|c: char| c.is_whitespace() || c == '/' || c == '\\') {
        return Err(ConfigError::invalid(
            key,
            format!("'{value}' must not contain whitespace or path separators"),
        ));
    }
    Ok(())
}

/// Operator overrides of the target identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOverrides {
    pub process_name: Option<String>,
    pub channel_name: Option<String>,
    pub version: Option<String>,
}

impl TargetOverrides {
    pub fn from_args(args: &TargetArgs) -> Result<Self, ConfigError> {
        let overrides = Self {
            process_name: args.custom_process_name.clone(),
            channel_name: args.custom_ipc_name.clone(),
            version: args.custom_chromium_version.clone(),
        };
        overrides.validate()?;
        Ok(overrides)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.process_name {
            validate_process_name("custom process name", name)?;
        }
        if let Some(name) = &self.channel_name {
            validate_channel_name("custom IPC name", name)?;
        }
        if let Some(version) = &self.version {
            version.parse::<DottedVersion>().map_err(|e| {
                ConfigError::invalid("custom version", e.to_string())
            })?;
        }
        Ok(())
    }

    /// All three set: the binary is never looked up.
    pub fn is_fully_custom(&self) -> bool {
        self.process_name.is_some() && self.channel_name.is_some() && self.version.is_some()
    }

    pub fn process_name<'a>(&'a self, config: &'a Config) -> &'a str {
        self.process_name.as_deref().unwrap_or(&config.process_name)
    }

    pub fn channel_name<'a>(&'a self, config: &'a Config) -> &'a str {
        self.channel_name.as_deref().unwrap_or(&config.channel_name)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    #[cfg(windows)]
    fn default_install_dir() -> PathBuf {
        use ipcsniff_common::constants::DEFAULT_INSTALL_SUBDIR;
        let program_files = std::env::var_os("ProgramFiles(x86)")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Program Files (x86)"));
        program_files.join(DEFAULT_INSTALL_SUBDIR)
    }

    #[cfg(not(windows))]
    fn default_install_dir() -> PathBuf {
        PathBuf::from(ipcsniff_common::constants::DEFAULT_INSTALL_DIR)
    }

    pub fn default_config_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ipcsniff").join(CONFIG_FILE_NAME))
    }

    /// Defaults, then the config file, then `IPCSNIFF_*` environment
    /// variables. An explicit `path` must exist; the default one may not.
    pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut builder = RConfig::builder()
            .set_default("process_name", DEFAULT_PROCESS_NAME)?
            .set_default("channel_name", DEFAULT_CHANNEL_NAME)?
            .set_default("module_file_name", DEFAULT_MODULE_FILE_NAME)?
            .set_default(
                "install_dir",
                Self::default_install_dir().to_string_lossy().to_string(),
            )?
            .set_default("namespace_filter", DEFAULT_NAMESPACE_FILTER)?
            .set_default("handshake_timeout_ms", HANDSHAKE_TIMEOUT_MS)?
            .set_default("registry_refresh_interval_ms", REGISTRY_REFRESH_INTERVAL_MS)?
            .set_default("registry_refresh_timeout_ms", REGISTRY_REFRESH_TIMEOUT_MS)?
            .set_default("frame_queue_capacity", FRAME_QUEUE_CAPACITY as u64)?
            .set_default(
                "metadata_cache_file",
                SNIFFER_WORK_DIR
                    .metadata_cache_file
                    .to_string_lossy()
                    .to_string(),
            )?
            .set_default(
                "legacy_ipc_metadata_cache_file",
                SNIFFER_WORK_DIR
                    .legacy_ipc_metadata_cache_file
                    .to_string_lossy()
                    .to_string(),
            )?
            .set_default("metadata_endpoint", METADATA_ENDPOINT)?
            .set_default("colorfilters_file", "")?
            .set_default("log_level", "debug")?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => match Self::default_config_file() {
                Some(default) => builder.add_source(File::from(default).required(false)),
                None => builder,
            },
        };

        let config: Config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, content: &str) -> PathBuf {
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = ConfigLoader::load_config(Some(&write_config(&tmp, ""))).unwrap();

        assert_eq!(config.process_name, "chrome");
        assert_eq!(config.channel_name, "chromiumipc");
        assert_eq!(config.namespace_filter, "mojo");
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.frame_queue_capacity, 1024);
        assert!(config.colorfilters_path().is_none());
    }

    #[test]
    #[serial]
    fn test_file_values_override_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "process_name = \"msedge\"\nhandshake_timeout_ms = 250\ncolorfilters_file = \"/tmp/cf\"\n",
        );

        let config = ConfigLoader::load_config(Some(&path)).unwrap();

        assert_eq!(config.process_name, "msedge");
        assert_eq!(config.handshake_timeout_ms, 250);
        assert_eq!(config.colorfilters_path(), Some(PathBuf::from("/tmp/cf")));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "channel_name = \"fromfile\"\n");

        std::env::set_var("IPCSNIFF_CHANNEL_NAME", "fromenv");
        let config = ConfigLoader::load_config(Some(&path));
        std::env::remove_var("IPCSNIFF_CHANNEL_NAME");

        assert_eq!(config.unwrap().channel_name, "fromenv");
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = ConfigLoader::load_config(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "channel_name = \"has space\"\n");
        let err = ConfigLoader::load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "channel_name", .. }));

        let path = write_config(&tmp, "frame_queue_capacity = 0\n");
        let err = ConfigLoader::load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "frame_queue_capacity", .. }));
    }

    #[test]
    fn test_override_validation() {
        let ok = TargetOverrides {
            process_name: Some("msedge".into()),
            channel_name: Some("edgeipc".into()),
            version: Some("120.0.1".into()),
        };
        assert!(ok.validate().is_ok());
        assert!(ok.is_fully_custom());

        let cases = [
            TargetOverrides {
                process_name: Some("".into()),
                ..Default::default()
            },
            TargetOverrides {
                process_name: Some("/usr/bin/chrome".into()),
                ..Default::default()
            },
            TargetOverrides {
                channel_name: Some("a b".into()),
                ..Default::default()
            },
            TargetOverrides {
                version: Some("latest".into()),
                ..Default::default()
            },
        ];
        for overrides in cases {
            assert!(overrides.validate().is_err(), "{overrides:?}");
        }
    }

    #[test]
    #[serial]
    fn test_partial_overrides_fall_back_to_config() {
        let tmp = TempDir::new().unwrap();
        let config = ConfigLoader::load_config(Some(&write_config(&tmp, ""))).unwrap();
        let overrides = TargetOverrides {
            channel_name: Some("edgeipc".into()),
            ..Default::default()
        };

        assert!(!overrides.is_fully_custom());
        assert_eq!(overrides.process_name(&config), "chrome");
        assert_eq!(overrides.channel_name(&config), "edgeipc");
    }
}
