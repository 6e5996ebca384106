//! Directory-backed publisher
//!
//! Copies charts into a directory the service itself serves under `/assets`.
//! Used when no image host is configured.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{public_id_from_url, AssetPublisher, PublishError, UnpublishOutcome};

pub struct LocalPublisher {
    published_dir: PathBuf,
    base_url: String,
}

impl LocalPublisher {
    pub fn new(published_dir: PathBuf, public_base_url: String) -> Self {
        Self {
            published_dir,
            base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn published_dir(&self) -> &Path {
        &self.published_dir
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.published_dir.join(format!("{}.png", id))
    }
}

/// Ids become file names, so only a conservative character set is allowed
fn validate_id(id: &str) -> Result<(), PublishError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PublishError::InvalidId(id.to_string()))
    }
}

#[async_trait]
impl AssetPublisher for LocalPublisher {
    async fn publish(&self, local_path: &Path, logical_id: &str) -> Result<String, PublishError> {
        validate_id(logical_id)?;
        tokio::fs::create_dir_all(&self.published_dir).await?;
        tokio::fs::copy(local_path, self.object_path(logical_id)).await?;

        Ok(format!("{}/assets/{}.png", self.base_url, logical_id))
    }

    async fn unpublish(&self, url: &str) -> UnpublishOutcome {
        let Some(id) = public_id_from_url(url) else {
            return UnpublishOutcome::Failed(format!("no object id in url '{}'", url));
        };
        if let Err(e) = validate_id(id) {
            return UnpublishOutcome::Failed(e.to_string());
        }

        match tokio::fs::remove_file(self.object_path(id)).await {
            Ok(()) => UnpublishOutcome::Ok,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                UnpublishOutcome::Failed("asset not found".to_string())
            }
            Err(e) => UnpublishOutcome::Failed(e.to_string()),
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn publish_then_unpublish() {
        let dir = TempDir::new().unwrap();
        let chart = dir.path().join("chart.png");
        std::fs::write(&chart, b"png").unwrap();

        let publisher = LocalPublisher::new(
            dir.path().join("published"),
            "http://127.0.0.1:8000/".to_string(),
        );
        let url = publisher.publish(&chart, "box_plots_abc").await.unwrap();

        assert_eq!(url, "http://127.0.0.1:8000/assets/box_plots_abc.png");
        assert!(dir.path().join("published/box_plots_abc.png").exists());

        assert_eq!(publisher.unpublish(&url).await, UnpublishOutcome::Ok);
        assert!(!dir.path().join("published/box_plots_abc.png").exists());

        // Second delete reports failure instead of erroring
        assert!(matches!(
            publisher.unpublish(&url).await,
            UnpublishOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn publish_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let chart = dir.path().join("chart.png");
        std::fs::write(&chart, b"png").unwrap();

        let publisher = LocalPublisher::new(dir.path().to_path_buf(), "http://x".to_string());
        let err = publisher.publish(&chart, "../escape").await.unwrap_err();
        assert!(matches!(err, PublishError::InvalidId(_)));
    }
}
