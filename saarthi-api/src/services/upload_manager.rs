//! Upload intake
//!
//! Creates a session for one uploaded file: fresh id, dedicated directory,
//! streamed write with a size limit, registry entry. Any failure removes the
//! directory again so no half-created session is left behind.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use saarthi_common::{fs_utils, uuid_utils};

use crate::error::ServiceError;
use crate::models::Session;
use crate::services::session_store::SessionStore;

/// Name used when the client supplies nothing usable
pub const FALLBACK_FILENAME: &str = "upload.csv";

pub struct UploadManager {
    store: SessionStore,
    uploads_dir: PathBuf,
    max_upload_bytes: u64,
}

impl UploadManager {
    pub fn new(store: SessionStore, uploads_dir: PathBuf, max_upload_bytes: u64) -> Self {
        Self {
            store,
            uploads_dir,
            max_upload_bytes,
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Persist the streamed file under a new session
    pub async fn create_session<S, B, E>(
        &self,
        file_name: &str,
        body: S,
    ) -> Result<Session, ServiceError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let original_filename = sanitize_filename(file_name);
        let session_id = uuid_utils::generate().to_string();
        let storage_path = self.uploads_dir.join(&session_id);

        tokio::fs::create_dir_all(&storage_path)
            .await
            .map_err(|e| ServiceError::StorageWrite(e.to_string()))?;

        let session = Session::new(session_id.clone(), storage_path.clone(), original_filename);

        let result = async {
            let written = self.write_body(&session.source_path(), body).await?;
            self.store
                .insert(session.clone())
                .await
                .map_err(|e| ServiceError::StorageWrite(e.to_string()))?;
            Ok::<u64, ServiceError>(written)
        }
        .await;

        match result {
            Ok(bytes) => {
                tracing::info!(
                    session_id = %session_id,
                    file = %session.original_filename,
                    bytes,
                    "Created session"
                );
                Ok(session)
            }
            Err(e) => {
                if let Err(cleanup) = fs_utils::remove_dir_if_exists(&storage_path) {
                    tracing::error!(
                        session_id = %session_id,
                        error = %cleanup,
                        "Failed to remove storage of failed upload"
                    );
                }
                tracing::warn!(session_id = %session_id, error = %e, "Upload rejected");
                Err(e)
            }
        }
    }

    async fn write_body<S, B, E>(&self, target: &Path, body: S) -> Result<u64, ServiceError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut body = std::pin::pin!(body);
        let mut file = tokio::fs::File::create(target)
            .await
            .map_err(|e| ServiceError::StorageWrite(e.to_string()))?;

        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ServiceError::StorageWrite(e.to_string()))?;
            let bytes = chunk.as_ref();
            written += bytes.len() as u64;
            if written > self.max_upload_bytes {
                return Err(ServiceError::InvalidInput(format!(
                    "file exceeds the upload limit of {} bytes",
                    self.max_upload_bytes
                )));
            }
            file.write_all(bytes)
                .await
                .map_err(|e| ServiceError::StorageWrite(e.to_string()))?;
        }

        file.flush()
            .await
            .map_err(|e| ServiceError::StorageWrite(e.to_string()))?;
        file.sync_all()
            .await
            .map_err(|e| ServiceError::StorageWrite(e.to_string()))?;
        Ok(written)
    }
}

/// Reduce a client-supplied name to a safe single path component
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}
