use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::{Message, RequirementRecord, Role, Session, SessionSummary};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("snapshot io: {0}")]
    Snapshot(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// In-memory conversation store. Map membership is guarded by the outer
/// lock; each session carries its own lock so appends to different sessions
/// never contend and a log is never observed half-written.
pub struct ConversationStore {
    sessions: RwLock<HashMap<Uuid, Arc<RwLock<Session>>>>,
    snapshot_dir: PathBuf,
}

impl ConversationStore {
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let snapshot_dir = snapshot_dir.into();
        std::fs::create_dir_all(&snapshot_dir)?;
        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            snapshot_dir,
        })
    }

    pub async fn create(&self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(session)));
        id
    }

    async fn handle(&self, id: Uuid) -> Result<Arc<RwLock<Session>>, StoreError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Appends a message stamped with the current time. Unknown sessions are
    /// an error; a session is never created implicitly.
    pub async fn append(
        &self,
        id: Uuid,
        role: Role,
        content: impl Into<String>,
    ) -> Result<(), StoreError> {
        let session = self.handle(id).await?;
        session.write().await.messages.push(Message::new(role, content));
        Ok(())
    }

    /// Returns a copy of the ordered message log.
    pub async fn get(&self, id: Uuid) -> Result<Vec<Message>, StoreError> {
        let session = self.handle(id).await?;
        let guard = session.read().await;
        Ok(guard.messages.clone())
    }

    pub async fn update_project(
        &self,
        id: Uuid,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<(), StoreError> {
        let session = self.handle(id).await?;
        let mut guard = session.write().await;
        if name.is_some() {
            guard.metadata.project_name = name;
        }
        if description.is_some() {
            guard.metadata.project_description = description;
        }
        Ok(())
    }

    pub async fn add_requirement(
        &self,
        id: Uuid,
        requirement: RequirementRecord,
    ) -> Result<(), StoreError> {
        let session = self.handle(id).await?;
        session
            .write()
            .await
            .metadata
            .elicited_requirements
            .push(requirement);
        Ok(())
    }

    pub async fn summary(&self, id: Uuid) -> Result<SessionSummary, StoreError> {
        let session = self.handle(id).await?;
        let guard = session.read().await;
        Ok(guard.summary())
    }

    pub async fn delete(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub fn snapshot_path(&self, id: Uuid) -> PathBuf {
        self.snapshot_dir.join(format!("conversation_{id}.json"))
    }

    /// Writes the full session record as pretty JSON, overwriting any prior
    /// snapshot for the same id.
    pub async fn snapshot(&self, id: Uuid) -> Result<PathBuf, StoreError> {
        let session = self.handle(id).await?;
        let json = {
            let guard = session.read().await;
            serde_json::to_string_pretty(&*guard)?
        };
        let path = self.snapshot_path(id);
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Loads a snapshot back into memory, replacing any in-memory entry.
    /// A missing file is a plain failure; malformed content is logged and
    /// treated the same way. Neither aborts the caller.
    pub async fn restore(&self, id: Uuid) -> bool {
        let path = self.snapshot_path(id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return false,
        };
        let session: Session = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(%id, %err, "discarding malformed snapshot");
                return false;
            }
        };
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(session)));
        true
    }
}
