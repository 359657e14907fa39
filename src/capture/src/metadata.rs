use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Keeps the interface definitions used by the analyzer in sync with the
/// version of the monitored application.
#[async_trait]
pub trait InterfaceMetadataService: Send + Sync {
    /// Version the cached metadata was built for, empty when there is none.
    fn current_cached_version(&self) -> String;

    /// Refreshes the cache when `force` is set or it was built for another
    /// version. Returns the version the cache holds afterwards.
    async fn refresh_if_stale(&self, resolved_version: &str, force: bool) -> Result<String>;
}

/// Finds the source revision a released version was built from.
#[async_trait]
pub trait RevisionLookup: Send + Sync {
    async fn commit_for_version(&self, version: &str) -> Result<String>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMetadataCache {
    pub version: String,
    pub commit: String,
    pub updated_at: DateTime<Utc>,
}

/// Resolves version tags through a git refs endpoint
/// (`<endpoint>/<version>` answering `{"object": {"sha": ...}}`).
pub struct GitTagLookup {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

impl GitTagLookup {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RevisionLookup for GitTagLookup {
    async fn commit_for_version(&self, version: &str) -> Result<String> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), version);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, format!("Chrome {version} IPC Sniffer"))
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Failed to query {url}"))?
            .error_for_status()
            .with_context(|| format!("No tag found for version {version}"))?;

        let git_ref: GitRef = response
            .json()
            .await
            .context("Unexpected response from tag endpoint")?;
        Ok(git_ref.object.sha)
    }
}

pub struct CachedInterfaceMetadata {
    cache_file: PathBuf,
    lookup: Arc<dyn RevisionLookup>,
}

impl CachedInterfaceMetadata {
    pub fn new(cache_file: impl Into<PathBuf>, lookup: Arc<dyn RevisionLookup>) -> Self {
        Self {
            cache_file: cache_file.into(),
            lookup,
        }
    }

    pub fn load(&self) -> Option<InterfaceMetadataCache> {
        let raw = std::fs::read_to_string(&self.cache_file).ok()?;
        match serde_json::from_str(&raw) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(
                    "Ignoring unreadable metadata cache {}: {}",
                    self.cache_file.display(),
                    e
                );
                None
            }
        }
    }

    fn store(&self, cache: &InterfaceMetadataCache) -> Result<()> {
        if let Some(parent) = self.cache_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(cache)?;
        std::fs::write(&self.cache_file, json)
            .with_context(|| format!("Failed to write {}", self.cache_file.display()))
    }
}

#[async_trait]
impl InterfaceMetadataService for CachedInterfaceMetadata {
    fn current_cached_version(&self) -> String {
        self.load().map(|cache| cache.version).unwrap_or_default()
    }

    #[tracing::instrument(skip(self))]
    async fn refresh_if_stale(&self, resolved_version: &str, force: bool) -> Result<String> {
        let cached = self.current_cached_version();

        if resolved_version.is_empty() {
            debug!("no resolved version, keeping cached metadata '{}'", cached);
            return Ok(cached);
        }
        if !force && cached == resolved_version {
            return Ok(cached);
        }

        info!("Updating interface metadata to version {}", resolved_version);
        let commit = match self.lookup.commit_for_version(resolved_version).await {
            Ok(commit) => commit,
            Err(e) => {
                warn!("Interface metadata lookup failed: {:#}", e);
                return Ok(cached);
            }
        };

        self.store(&InterfaceMetadataCache {
            version: resolved_version.to_string(),
            commit,
            updated_at: Utc::now(),
        })?;
        Ok(resolved_version.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeLookup {
        answer: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeLookup {
        fn new(answer: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RevisionLookup for FakeLookup {
        async fn commit_for_version(&self, version: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(sha) => Ok(sha.to_string()),
                None => anyhow::bail!("no tag for {version}"),
            }
        }
    }

    fn seeded(tmp: &TempDir, version: &str) -> PathBuf {
        let path = tmp.path().join("interfaces_info.json");
        let cache = InterfaceMetadataCache {
            version: version.to_string(),
            commit: "abc".to_string(),
            updated_at: Utc::now(),
        };
        std::fs::write(&path, serde_json::to_string(&cache).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_cache_reports_empty_version() {
        let tmp = TempDir::new().unwrap();
        let service =
            CachedInterfaceMetadata::new(tmp.path().join("none.json"), FakeLookup::new(None));
        assert_eq!(service.current_cached_version(), "");
    }

    #[tokio::test]
    async fn test_matching_version_skips_lookup() {
        let tmp = TempDir::new().unwrap();
        let lookup = FakeLookup::new(Some("def"));
        let service = CachedInterfaceMetadata::new(seeded(&tmp, "90.0.2.1"), lookup.clone());

        let version = service.refresh_if_stale("90.0.2.1", false).await.unwrap();

        assert_eq!(version, "90.0.2.1");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_is_rewritten() {
        let tmp = TempDir::new().unwrap();
        let lookup = FakeLookup::new(Some("def"));
        let path = seeded(&tmp, "89.0.1.0");
        let service = CachedInterfaceMetadata::new(&path, lookup.clone());

        let version = service.refresh_if_stale("90.0.2.1", false).await.unwrap();

        assert_eq!(version, "90.0.2.1");
        let cache = service.load().unwrap();
        assert_eq!(cache.version, "90.0.2.1");
        assert_eq!(cache.commit, "def");
    }

    #[tokio::test]
    async fn test_force_refetches_same_version() {
        let tmp = TempDir::new().unwrap();
        let lookup = FakeLookup::new(Some("def"));
        let service = CachedInterfaceMetadata::new(seeded(&tmp, "90.0.2.1"), lookup.clone());

        service.refresh_if_stale("90.0.2.1", true).await.unwrap();

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_previous_version() {
        let tmp = TempDir::new().unwrap();
        let service =
            CachedInterfaceMetadata::new(seeded(&tmp, "89.0.1.0"), FakeLookup::new(None));

        let version = service.refresh_if_stale("90.0.2.1", false).await.unwrap();

        assert_eq!(version, "89.0.1.0");
    }

    #[tokio::test]
    async fn test_empty_version_skips_refresh() {
        let tmp = TempDir::new().unwrap();
        let lookup = FakeLookup::new(Some("def"));
        let service = CachedInterfaceMetadata::new(seeded(&tmp, "89.0.1.0"), lookup.clone());

        let version = service.refresh_if_stale("", true).await.unwrap();

        assert_eq!(version, "89.0.1.0");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }
}
