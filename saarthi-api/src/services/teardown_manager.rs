//! Session teardown
//!
//! Deletes remote assets (best-effort), the storage directory and finally the
//! registry entry. Steps already completed are not rolled back on failure.

use std::sync::Arc;

use saarthi_common::fs_utils;

use crate::error::ServiceError;
use crate::services::publisher::{AssetPublisher, UnpublishOutcome};
use crate::services::session_store::SessionStore;

/// Outcome of a completed teardown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub assets_unpublished: usize,
    pub assets_failed: usize,
    /// False when the storage directory was already gone
    pub storage_removed: bool,
}

pub struct TeardownManager {
    store: SessionStore,
    publisher: Arc<dyn AssetPublisher>,
}

impl TeardownManager {
    pub fn new(store: SessionStore, publisher: Arc<dyn AssetPublisher>) -> Self {
        Self { store, publisher }
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<TeardownReport, ServiceError> {
        let session = self.store.get(session_id).await?;
        let mut report = TeardownReport::default();

        for asset in &session.assets {
            match self.publisher.unpublish(&asset.url).await {
                UnpublishOutcome::Ok => report.assets_unpublished += 1,
                UnpublishOutcome::Failed(reason) => {
                    report.assets_failed += 1;
                    tracing::warn!(
                        session_id = %session_id,
                        asset = %asset.kind,
                        url = %asset.url,
                        reason = %reason,
                        "Failed to delete remote asset"
                    );
                }
            }
        }

        let storage_path = session.storage_path.clone();
        report.storage_removed =
            tokio::task::spawn_blocking(move || fs_utils::remove_dir_if_exists(&storage_path))
                .await?
                .map_err(|e| {
                    ServiceError::Teardown(format!(
                        "failed to remove {}: {}",
                        session.storage_path.display(),
                        e
                    ))
                })?;

        match self.store.remove(session_id).await {
            Ok(_) => {}
            // Removed concurrently; the session is gone either way
            Err(ServiceError::SessionNotFound(_)) => {}
            Err(e) => return Err(ServiceError::Teardown(e.to_string())),
        }

        tracing::info!(
            session_id = %session_id,
            unpublished = report.assets_unpublished,
            failed = report.assets_failed,
            "Session deleted"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Asset, AssetKind, Session};
    use crate::services::publisher::LocalPublisher;
    use std::path::Path;
    use tempfile::TempDir;

    async fn setup(dir: &Path) -> (SessionStore, Arc<LocalPublisher>, Session) {
        let store = SessionStore::new(dir.join("registry.json"));
        let publisher = Arc::new(LocalPublisher::new(
            dir.join("published"),
            "http://test".to_string(),
        ));

        let storage = dir.join("uploads").join("s1");
        std::fs::create_dir_all(&storage).unwrap();
        std::fs::write(storage.join("data.csv"), "a\n1\n").unwrap();
        let chart = storage.join("chart.png");
        std::fs::write(&chart, b"png").unwrap();

        let mut session = Session::new("s1".to_string(), storage, "data.csv".to_string());
        let url = publisher.publish(&chart, "box_plots_s1").await.unwrap();
        session.set_asset(Asset {
            kind: AssetKind::BoxPlot,
            url,
        });
        session.set_asset(Asset {
            kind: AssetKind::Histogram,
            url: "http://test/assets/histograms_s1.png".to_string(),
        });
        store.insert(session.clone()).await.unwrap();
        (store, publisher, session)
    }

    #[tokio::test]
    async fn delete_removes_everything_and_reports_failures() {
        let dir = TempDir::new().unwrap();
        let (store, publisher, session) = setup(dir.path()).await;
        let teardown = TeardownManager::new(store.clone(), publisher);

        let report = teardown.delete_session("s1").await.unwrap();

        // The histogram was never published, so its delete fails without aborting
        assert_eq!(report.assets_unpublished, 1);
        assert_eq!(report.assets_failed, 1);
        assert!(report.storage_removed);
        assert!(!session.storage_path.exists());
        assert!(!dir.path().join("published/box_plots_s1.png").exists());
        assert!(store.get("s1").await.is_err());
    }

    #[tokio::test]
    async fn second_delete_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (store, publisher, _) = setup(dir.path()).await;
        let teardown = TeardownManager::new(store, publisher);

        teardown.delete_session("s1").await.unwrap();
        assert!(matches!(
            teardown.delete_session("s1").await,
            Err(ServiceError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_directory_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let (store, publisher, session) = setup(dir.path()).await;
        std::fs::remove_dir_all(&session.storage_path).unwrap();
        let teardown = TeardownManager::new(store.clone(), publisher);

        let report = teardown.delete_session("s1").await.unwrap();
        assert!(!report.storage_removed);
        assert!(store.list().await.unwrap().is_empty());
    }
}
