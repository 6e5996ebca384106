//! Asset publishing
//!
//! A publisher turns a local chart image into a durable URL and can later
//! delete it again. Deletion is best-effort and reports an outcome instead of
//! failing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use saarthi_common::config::{ResolvedPublisher, Settings};

pub mod cloudinary;
pub mod local;

pub use cloudinary::CloudinaryPublisher;
pub use local::LocalPublisher;

/// Publishing errors
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Image host error {0}: {1}")]
    Api(u16, String),

    #[error("Failed to read asset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid asset id: {0}")]
    InvalidId(String),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected response: {0}")]
    Response(String),
}

/// Result of a best-effort delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpublishOutcome {
    Ok,
    Failed(String),
}

impl UnpublishOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, UnpublishOutcome::Ok)
    }
}

#[async_trait]
pub trait AssetPublisher: Send + Sync {
    /// Upload the file under `logical_id`, replacing any previous object
    async fn publish(&self, local_path: &Path, logical_id: &str) -> Result<String, PublishError>;

    /// Delete the object behind a previously returned URL
    async fn unpublish(&self, url: &str) -> UnpublishOutcome;

    fn name(&self) -> &'static str;
}

/// Object id encoded in a delivery URL: last path segment up to the first '.'
pub fn public_id_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let id = segment.split('.').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Build the publisher selected by the resolved settings
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn AssetPublisher>, PublishError> {
    match &settings.publisher {
        ResolvedPublisher::Cloudinary(credentials) => {
            tracing::info!(cloud = %credentials.cloud_name, "Publishing charts to Cloudinary");
            Ok(Arc::new(CloudinaryPublisher::new(
                credentials.clone(),
                settings.publish_timeout,
            )?))
        }
        ResolvedPublisher::Local => {
            tracing::info!(
                dir = %settings.published_dir.display(),
                "Publishing charts to local directory"
            );
            Ok(Arc::new(LocalPublisher::new(
                settings.published_dir.clone(),
                settings.public_base_url.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_id_is_last_segment_without_extension() {
        let url = "https://res.cloudinary.com/demo/image/upload/f_auto,q_auto/corr_matrix_abc";
        assert_eq!(public_id_from_url(url), Some("corr_matrix_abc"));

        let local = "http://127.0.0.1:8000/assets/box_plots_abc.png";
        assert_eq!(public_id_from_url(local), Some("box_plots_abc"));

        let versioned = "https://res.cloudinary.com/demo/image/upload/v17/histograms_x.png?x=1";
        assert_eq!(public_id_from_url(versioned), Some("histograms_x"));
    }

    #[test]
    fn public_id_rejects_empty_segment() {
        assert_eq!(public_id_from_url(""), None);
        assert_eq!(public_id_from_url("https://host/assets/.png"), None);
    }
}
