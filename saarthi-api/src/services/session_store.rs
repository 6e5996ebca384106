//! Session registry
//!
//! Durable mapping of session id to [`Session`], persisted as one JSON
//! snapshot. Every public operation runs its full load, mutate and save
//! sequence under one async lock, so concurrent requests cannot lose each
//! other's updates. A missing or unreadable snapshot is an empty registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use saarthi_common::fs_utils;

use crate::error::ServiceError;
use crate::models::{Asset, Session};

type Registry = BTreeMap<String, Session>;

/// Shared handle to the session registry
#[derive(Clone)]
pub struct SessionStore {
    snapshot_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl SessionStore {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Arc::new(snapshot_path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub async fn get(&self, session_id: &str) -> Result<Session, ServiceError> {
        let _guard = self.lock.lock().await;
        let registry = self.load().await?;
        registry
            .get(session_id)
            .cloned()
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))
    }

    pub async fn insert(&self, session: Session) -> Result<(), ServiceError> {
        let _guard = self.lock.lock().await;
        let mut registry = self.load().await?;
        if registry.contains_key(&session.session_id) {
            return Err(ServiceError::Registry(format!(
                "session {} already registered",
                session.session_id
            )));
        }
        registry.insert(session.session_id.clone(), session);
        self.save(registry).await
    }

    pub async fn remove(&self, session_id: &str) -> Result<Session, ServiceError> {
        let _guard = self.lock.lock().await;
        let mut registry = self.load().await?;
        let session = registry
            .remove(session_id)
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;
        self.save(registry).await?;
        Ok(session)
    }

    /// Overwrite assets per kind and record the fingerprint they belong to
    pub async fn record_assets(
        &self,
        session_id: &str,
        fingerprint: &str,
        assets: Vec<Asset>,
    ) -> Result<Session, ServiceError> {
        let _guard = self.lock.lock().await;
        let mut registry = self.load().await?;
        let session = registry
            .get_mut(session_id)
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;

        for asset in assets {
            session.set_asset(asset);
        }
        session.eda_fingerprint = Some(fingerprint.to_string());
        let updated = session.clone();

        self.save(registry).await?;
        Ok(updated)
    }

    pub async fn list(&self) -> Result<Vec<Session>, ServiceError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_values().collect())
    }

    /// Drop entries whose storage directory no longer exists
    ///
    /// Returns the ids that were removed.
    pub async fn reconcile(&self) -> Result<Vec<String>, ServiceError> {
        let _guard = self.lock.lock().await;
        let mut registry = self.load().await?;

        let mut dropped = Vec::new();
        for (id, session) in &registry {
            if !tokio::fs::try_exists(&session.storage_path)
                .await
                .unwrap_or(false)
            {
                dropped.push(id.clone());
            }
        }
        if dropped.is_empty() {
            return Ok(dropped);
        }

        for id in &dropped {
            registry.remove(id);
            tracing::warn!(session_id = %id, "Dropping session whose storage directory is gone");
        }
        self.save(registry).await?;
        Ok(dropped)
    }

    async fn load(&self) -> Result<Registry, ServiceError> {
        let bytes = match tokio::fs::read(self.snapshot_path.as_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Registry::new()),
            Err(e) => {
                return Err(ServiceError::Registry(format!(
                    "failed to read {}: {}",
                    self.snapshot_path.display(),
                    e
                )))
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Registry::new());
        }

        match serde_json::from_slice::<Registry>(&bytes) {
            Ok(mut registry) => {
                for (id, session) in registry.iter_mut() {
                    if session.session_id.is_empty() {
                        session.session_id = id.clone();
                    }
                }
                Ok(registry)
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.snapshot_path.display(),
                    error = %e,
                    "Session registry is corrupt; starting from an empty registry"
                );
                Ok(Registry::new())
            }
        }
    }

    async fn save(&self, registry: Registry) -> Result<(), ServiceError> {
        let path = Arc::clone(&self.snapshot_path);
        tokio::task::spawn_blocking(move || {
            let json = serde_json::to_vec_pretty(&registry)
                .map_err(|e| ServiceError::Registry(e.to_string()))?;
            fs_utils::write_atomic(&path, &json).map_err(|e| ServiceError::Registry(e.to_string()))
        })
        .await?
    }
}
