use std::path::PathBuf;

use log::{debug, info};
use tokio::fs;

use crate::networking::NetworkClient;
use crate::util::sha256_hex;

pub mod models;

pub use models::ManifestEntry;

/// Result of comparing the remote index with the local cache.
#[derive(Clone, Debug)]
pub struct SyncOutcome {
    /// Always the freshly fetched entries, even when nothing changed.
    pub entries: Vec<ManifestEntry>,
    pub changed: bool,
}

/// Keeps the local manifest cache in step with the remote index.
#[derive(Clone, Debug)]
pub struct IndexSynchronizer {
    network: NetworkClient,
    cache_path: PathBuf,
    side_path: PathBuf,
}

impl IndexSynchronizer {
    pub fn new(network: NetworkClient, cache_path: PathBuf, side_path: PathBuf) -> Self {
        Self {
            network,
            cache_path,
            side_path,
        }
    }

    /// Fetch the remote index and replace the cache when its content hash differs.
    ///
    /// The cache is never written in place: the fresh manifest goes to the side
    /// file first and is renamed over the cache.
    pub async fn synchronize(&self, remote_url: &str) -> Result<SyncOutcome, String> {
        info!("index: fetching {remote_url}");
        let entries: Vec<ManifestEntry> = self.network.get_json(remote_url).await?;
        let fresh = serde_json::to_vec(&entries)
            .map_err(|e| format!("failed to serialize manifest: {e}"))?;

        let cache_exists = fs::try_exists(&self.cache_path).await.map_err(|e| {
            format!("failed to inspect {}: {e}", self.cache_path.display())
        })?;

        self.write_side_file(&fresh).await?;

        if !cache_exists {
            self.promote_side_file().await?;
            info!(
                "index: created {} with {} entries",
                self.cache_path.display(),
                entries.len()
            );
            return Ok(SyncOutcome {
                entries,
                changed: true,
            });
        }

        let cached = fs::read(&self.cache_path)
            .await
            .map_err(|e| format!("failed to read {}: {e}", self.cache_path.display()))?;
        let cached_hash = sha256_hex(&cached);
        let fresh_hash = sha256_hex(&fresh);
        debug!("index: cached={cached_hash} fresh={fresh_hash}");

        if cached_hash != fresh_hash {
            self.promote_side_file().await?;
            info!("index: {} updated", self.cache_path.display());
            return Ok(SyncOutcome {
                entries,
                changed: true,
            });
        }

        fs::remove_file(&self.side_path)
            .await
            .map_err(|e| format!("failed to remove {}: {e}", self.side_path.display()))?;
        info!("index: {} is up-to-date", self.cache_path.display());
        Ok(SyncOutcome {
            entries,
            changed: false,
        })
    }

    async fn write_side_file(&self, bytes: &[u8]) -> Result<(), String> {
        if let Some(parent) = self.side_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
        fs::write(&self.side_path, bytes)
            .await
            .map_err(|e| format!("failed to write {}: {e}", self.side_path.display()))
    }

    async fn promote_side_file(&self) -> Result<(), String> {
        fs::rename(&self.side_path, &self.cache_path)
            .await
            .map_err(|e| {
                format!(
                    "failed to replace {} with {}: {e}",
                    self.cache_path.display(),
                    self.side_path.display()
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::Router;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    type SharedBody = Arc<Mutex<String>>;

    async fn manifest(State(body): State<SharedBody>) -> String {
        body.lock().unwrap().clone()
    }

    async fn serve_manifest(initial: &[ManifestEntry]) -> (String, SharedBody) {
        let body: SharedBody = Arc::new(Mutex::new(serde_json::to_string(initial).unwrap()));
        let router = Router::new()
            .route("/index.json", get(manifest))
            .with_state(body.clone());
        let base = testing::serve(router).await;
        (format!("{base}/index.json"), body)
    }

    fn entry(name: &str, count: i64) -> ManifestEntry {
        ManifestEntry {
            name: name.to_owned(),
            program_url: format!("https://hackerone.com/{name}"),
            url: format!("https://chaos-data.projectdiscovery.io/{name}.zip"),
            count,
            change: 0,
            is_new: false,
            platform: "hackerone".to_owned(),
            bounty: true,
            last_updated: "2024-01-15T08:00:00Z".parse().unwrap(),
        }
    }

    fn synchronizer(dir: &Path) -> IndexSynchronizer {
        IndexSynchronizer::new(
            testing::client(),
            dir.join("input.json"),
            dir.join("new.json"),
        )
    }

    #[tokio::test]
    async fn first_run_creates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = vec![entry("alpha", 10), entry("beta", 20)];
        let (url, _) = serve_manifest(&manifest).await;

        let outcome = synchronizer(dir.path()).synchronize(&url).await.unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.entries, manifest);
        let cached: Vec<ManifestEntry> =
            serde_json::from_slice(&std::fs::read(dir.path().join("input.json")).unwrap()).unwrap();
        assert_eq!(cached, manifest);
        assert!(!dir.path().join("new.json").exists());
    }

    #[tokio::test]
    async fn identical_manifest_reports_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = vec![entry("alpha", 10)];
        let (url, _) = serve_manifest(&manifest).await;
        let sync = synchronizer(dir.path());

        assert!(sync.synchronize(&url).await.unwrap().changed);
        let before = std::fs::read(dir.path().join("input.json")).unwrap();

        let second = sync.synchronize(&url).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.entries, manifest);
        assert_eq!(std::fs::read(dir.path().join("input.json")).unwrap(), before);
        assert!(!dir.path().join("new.json").exists());
    }

    #[tokio::test]
    async fn different_manifest_replaces_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (url, body) = serve_manifest(&[entry("alpha", 10)]).await;
        let sync = synchronizer(dir.path());
        sync.synchronize(&url).await.unwrap();

        let updated = vec![entry("alpha", 11), entry("gamma", 3)];
        *body.lock().unwrap() = serde_json::to_string(&updated).unwrap();

        let outcome = sync.synchronize(&url).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.entries, updated);
        let cached: Vec<ManifestEntry> =
            serde_json::from_slice(&std::fs::read(dir.path().join("input.json")).unwrap()).unwrap();
        assert_eq!(cached, updated);
        assert!(!dir.path().join("new.json").exists());
    }

    #[tokio::test]
    async fn fetch_failure_leaves_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("input.json"), "[]").unwrap();
        let base = testing::serve(Router::new().route(
            "/index.json",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;

        let err = synchronizer(dir.path())
            .synchronize(&format!("{base}/index.json"))
            .await
            .unwrap_err();
        assert!(err.contains("500"), "{err}");
        assert_eq!(std::fs::read_to_string(dir.path().join("input.json")).unwrap(), "[]");
    }

    #[tokio::test]
    async fn malformed_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let base = testing::serve(
            Router::new().route("/index.json", get(|| async { r#"{"not":"a list"}"# })),
        )
        .await;

        let err = synchronizer(dir.path())
            .synchronize(&format!("{base}/index.json"))
            .await
            .unwrap_err();
        assert!(err.contains("decode"), "{err}");
        assert!(!dir.path().join("input.json").exists());
    }
}
