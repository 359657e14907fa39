//! Enumeration of IPC endpoints that monitored processes already hold open.

use std::collections::HashSet;
use tracing::{debug, warn};

/// Lists channel identifiers currently open in the given processes.
///
/// Identifiers must use the same naming as the capture reader reports on
/// frames, otherwise "pre-existing" filtering can never match.
pub trait ChannelEnumerator: Send + Sync {
    fn open_channels(&self, pids: &[u32]) -> HashSet<String>;
}

/// Reads `/proc/<pid>/fd` link targets and keeps sockets and pipes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcFdEnumerator;

impl ProcFdEnumerator {
    fn is_channel(link_target: &str) -> bool {
        link_target.starts_with("socket:[") || link_target.starts_with("pipe:[")
    }

    #[cfg(target_os = "linux")]
    fn channels_of(pid: u32) -> std::io::Result<Vec<String>> {
        let mut channels = Vec::new();
        for entry in std::fs::read_dir(format!("/proc/{pid}/fd"))? {
            // fds close while we iterate
            let Ok(entry) = entry else { continue };
            let Ok(target) = std::fs::read_link(entry.path()) else {
                continue;
            };
            let target = target.to_string_lossy().to_string();
            if Self::is_channel(&target) {
                channels.push(target);
            }
        }
        Ok(channels)
    }

    #[cfg(not(target_os = "linux"))]
    fn channels_of(_pid: u32) -> std::io::Result<Vec<String>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "handle enumeration is not supported on this platform",
        ))
    }
}

impl ChannelEnumerator for ProcFdEnumerator {
    fn open_channels(&self, pids: &[u32]) -> HashSet<String> {
        let mut channels = HashSet::new();
        for pid in pids {
            match Self::channels_of(*pid) {
                Ok(found) => {
                    debug!("process {} holds {} channels", pid, found.len());
                    channels.extend(found);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Unsupported => {
                    warn!("{}", e);
                    break;
                }
                Err(e) => debug!("skipping channels of process {}: {}", pid, e),
            }
        }
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sockets_and_pipes_are_channels() {
        assert!(ProcFdEnumerator::is_channel("socket:[48213]"));
        assert!(ProcFdEnumerator::is_channel("pipe:[1200]"));
        assert!(!ProcFdEnumerator::is_channel("/dev/null"));
        assert!(!ProcFdEnumerator::is_channel("anon_inode:[eventfd]"));
    }

    #[test]
    fn test_vanished_pid_is_skipped() {
        let channels = ProcFdEnumerator.open_channels(&[u32::MAX]);
        assert!(channels.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_current_process_socket_is_listed() {
        let (_left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let channels = ProcFdEnumerator.open_channels(&[std::process::id()]);
        assert!(channels.iter().any(|c| c.starts_with("socket:[")));
    }
}
