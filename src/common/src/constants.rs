// Monitored application defaults
pub const DEFAULT_PROCESS_NAME: &str = "chrome";
pub const DEFAULT_CHANNEL_NAME: &str = "chromiumipc";
pub const DEFAULT_NAMESPACE_FILTER: &str = "mojo";

#[cfg(windows)]
pub const DEFAULT_MODULE_FILE_NAME: &str = "chrome.dll";
#[cfg(not(windows))]
pub const DEFAULT_MODULE_FILE_NAME: &str = "chrome";

/// Install directory relative to `%ProgramFiles(x86)%`.
#[cfg(windows)]
pub const DEFAULT_INSTALL_SUBDIR: &str = r"Google\Chrome\Application";
#[cfg(not(windows))]
pub const DEFAULT_INSTALL_DIR: &str = "/opt/google/chrome";

// Timings
pub const HANDSHAKE_TIMEOUT_MS: u64 = 5_000;
pub const REGISTRY_REFRESH_INTERVAL_MS: u64 = 2_000;
pub const REGISTRY_REFRESH_TIMEOUT_MS: u64 = 3_000;
pub const FRAME_QUEUE_CAPACITY: usize = 1024;

// Command line markers, matched as raw substrings
pub const PROCESS_TYPE_MARKER: &str = "--type=";
pub const EXTENSION_PROCESS_MARKER: &str = "--extension-process";
pub const DISABLE_DATABASES_MARKER: &str = "--disable-databases";
pub const WATCHER_MARKER: &str = "--type=watcher";
pub const NETWORK_SERVICE_MARKER: &str = "--service-sandbox-type=network";
pub const CDM_SERVICE_MARKER: &str = "--service-sandbox-type=cdm";
pub const GPU_PROCESS_MARKER: &str = "--type=gpu-process";
pub const RENDERER_MARKER: &str = "--type=renderer";

// Interface metadata
pub const METADATA_CACHE_FILE: &str = "interfaces_info.json";
pub const LEGACY_IPC_METADATA_CACHE_FILE: &str = "legacy_ipc_interfaces_info.json";
pub const METADATA_ENDPOINT: &str = "https://api.github.com/repos/chromium/chromium/git/refs/tags";

// Presentation host legend
pub const COLORFILTERS_FILE: &str = "colorfilters";
pub const LEGEND_MARKER: &str = "@mojouser";
pub const LEGEND_ENTRIES: &[(&str, &str, &str)] = &[
    ("Mojo Data", "mojodata", "[65278,65535,53456][0,0,0]"),
    ("Legacy IPC", "legacyipc", "[64764,57568,65535][0,0,0]"),
    ("Mojo User", "mojouser", "[56026,61166,65535][0,0,0]"),
    ("Mojo", "mojo", "[58596,65535,51143][0,0,0]"),
    ("NPFS", "npfs", "[59367,59110,65535][0,0,0]"),
];

pub const ENV_PREFIX: &str = "IPCSNIFF";
pub const CONFIG_FILE_NAME: &str = "config.toml";
