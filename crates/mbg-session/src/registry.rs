//! Session registry
//!
//! Process-wide mapping from session identifier to live session state. The
//! single shared mutable structure in the gateway; every insert and remove
//! is atomic with respect to concurrent lookups.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use mbg_core::credstore::{self, SessionMeta, SessionSummary};

use crate::error::Result;
use crate::session::Session;

/// Registry of live sessions plus the on-disk credential base directory
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    base_dir: PathBuf,
}

impl SessionRegistry {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn insert(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn find_by_folder(&self, folder: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .await
            .values()
            .find(|s| s.folder == folder)
            .cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(session_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Merge on-disk credential metadata with in-memory liveness.
    /// Read-only; no side effects.
    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let sessions = self.sessions.read().await;
        let mut summaries = Vec::new();
        for folder in credstore::list_session_dirs(&self.base_dir)? {
            let meta = match SessionMeta::load(&self.base_dir.join(&folder)) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(folder = %folder, error = %e, "unreadable session metadata");
                    SessionMeta::default()
                }
            };
            let online = sessions.values().any(|s| s.folder == folder);
            let last_seen = meta.connected_at;
            summaries.push(SessionSummary {
                folder,
                meta,
                online,
                last_seen,
            });
        }
        Ok(summaries)
    }

    /// Tear a session down by folder name: close the connection handle
    /// (best-effort), drop the registry entry and delete the credential
    /// record. Also works when no live session uses the folder.
    pub async fn destroy_by_folder(&self, folder: &str) -> Result<()> {
        if let Some(session) = self.find_by_folder(folder).await {
            session.stop_ghosts().await;
            if let Err(e) = session.transport.close().await {
                warn!(session = %session.id, error = %e, "failed to close connection");
            }
            self.remove(&session.id).await;
            info!(session = %session.id, folder = %folder, "session destroyed");
        }
        credstore::remove_session_dir(&self.base_dir, folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbg_core::transport::memory::MemoryTransport;
    use mbg_core::Transport;
    use tempfile::TempDir;

    fn session_in(dir: &Path, id: &str, folder: &str) -> (Arc<Session>, Arc<MemoryTransport>) {
        let (transport, _events) = MemoryTransport::new();
        let session = Arc::new(Session::new(
            id,
            folder,
            dir.join(folder),
            transport.clone(),
            None,
        ));
        (session, transport)
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let tmp = TempDir::new().unwrap();
        let registry = SessionRegistry::new(tmp.path());
        let (session, _) = session_in(tmp.path(), "sid", "auth_info1");

        registry.insert(session.clone()).await;
        assert!(registry.get("sid").await.is_some());
        assert!(registry.find_by_folder("auth_info1").await.is_some());

        registry.remove("sid").await;
        assert!(registry.get("sid").await.is_none());
    }

    #[tokio::test]
    async fn test_list_merges_disk_and_liveness() {
        let tmp = TempDir::new().unwrap();
        let registry = SessionRegistry::new(tmp.path());

        let online_meta = SessionMeta {
            folder_name: Some("auth_info1".into()),
            connected_at: Some(42),
            ..Default::default()
        };
        online_meta.save(&tmp.path().join("auth_info1")).unwrap();
        SessionMeta::default().save(&tmp.path().join("auth_info2")).unwrap();

        let (session, _) = session_in(tmp.path(), "sid", "auth_info1");
        registry.insert(session).await;

        let mut summaries = registry.list().await.unwrap();
        summaries.sort_by(|a, b| a.folder.cmp(&b.folder));
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].online);
        assert_eq!(summaries[0].last_seen, Some(42));
        assert!(!summaries[1].online);
    }

    #[tokio::test]
    async fn test_destroy_closes_and_removes_dir() {
        let tmp = TempDir::new().unwrap();
        let registry = SessionRegistry::new(tmp.path());

        SessionMeta::default().save(&tmp.path().join("auth_info1")).unwrap();
        let (session, transport) = session_in(tmp.path(), "sid", "auth_info1");
        registry.insert(session).await;

        registry.destroy_by_folder("auth_info1").await.unwrap();
        assert!(!transport.is_open());
        assert_eq!(registry.session_count().await, 0);
        assert!(!tmp.path().join("auth_info1").exists());
    }

    #[tokio::test]
    async fn test_destroy_offline_folder() {
        let tmp = TempDir::new().unwrap();
        let registry = SessionRegistry::new(tmp.path());
        SessionMeta::default().save(&tmp.path().join("auth_info3")).unwrap();

        // no live session uses the folder; removal still succeeds
        registry.destroy_by_folder("auth_info3").await.unwrap();
        assert!(!tmp.path().join("auth_info3").exists());
    }
}
