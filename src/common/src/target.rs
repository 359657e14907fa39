use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolved identity of the monitored application.
///
/// Built once at startup and shared read-only for the rest of the run, so
/// fields are only reachable through getters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TargetDescriptor {
    process_name_pattern: String,
    resolved_version: String,
    capture_channel_name: String,
    binary_path: Option<PathBuf>,
}

impl TargetDescriptor {
    /// A target whose binary was located on disk.
    pub fn resolved(
        process_name_pattern: impl Into<String>,
        resolved_version: impl Into<String>,
        capture_channel_name: impl Into<String>,
        binary_path: PathBuf,
    ) -> Self {
        Self {
            process_name_pattern: process_name_pattern.into(),
            resolved_version: resolved_version.into(),
            capture_channel_name: capture_channel_name.into(),
            binary_path: Some(binary_path),
        }
    }

    /// A fully operator-supplied target; no binary lookup happened.
    pub fn custom(
        process_name_pattern: impl Into<String>,
        resolved_version: impl Into<String>,
        capture_channel_name: impl Into<String>,
    ) -> Self {
        Self {
            process_name_pattern: process_name_pattern.into(),
            resolved_version: resolved_version.into(),
            capture_channel_name: capture_channel_name.into(),
            binary_path: None,
        }
    }

    pub fn process_name_pattern(&self) -> &str {
        &self.process_name_pattern
    }

    pub fn resolved_version(&self) -> &str {
        &self.resolved_version
    }

    pub fn capture_channel_name(&self) -> &str {
        &self.capture_channel_name
    }

    pub fn binary_path(&self) -> Option<&Path> {
        self.binary_path.as_deref()
    }

    pub fn is_custom(&self) -> bool {
        self.binary_path.is_none()
    }

    pub fn is_versioned(&self) -> bool {
        !self.resolved_version.is_empty()
    }
}

/// Per-frame filters applied while capturing.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureFilter {
    /// Empty means every channel and category is accepted.
    pub role_or_namespace_filter: String,
    /// Drop frames on channels that were already open before the session.
    pub only_new_channels: bool,
}

impl CaptureFilter {
    pub fn new(role_or_namespace_filter: impl Into<String>, only_new_channels: bool) -> Self {
        Self {
            role_or_namespace_filter: role_or_namespace_filter.into(),
            only_new_channels,
        }
    }

    pub fn accepts_name(&self, channel: &str, category: Option<&str>) -> bool {
        let filter = self.role_or_namespace_filter.as_str();
        filter.is_empty()
            || channel.contains(filter)
            || category.is_some_and(|category| category.contains(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_target_has_no_binary() {
        let target = TargetDescriptor::custom("msedge", "", "edgeipc");
        assert!(target.is_custom());
        assert!(!target.is_versioned());
        assert_eq!(target.capture_channel_name(), "edgeipc");
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = CaptureFilter::default();
        assert!(filter.accepts_name("chrome.sync.1234", None));
    }

    #[test]
    fn test_namespace_filter_matches_channel_or_category() {
        let filter = CaptureFilter::new("mojo", false);
        assert!(filter.accepts_name("\\\\.\\pipe\\mojo.1234.5678", None));
        assert!(!filter.accepts_name("chrome.sync.1234", Some("renderer")));

        let filter = CaptureFilter::new("renderer", false);
        assert!(filter.accepts_name("socket:[991]", Some("renderer")));
    }
}
