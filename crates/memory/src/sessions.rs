//! In-memory [`SessionStore`].

use async_trait::async_trait;
use screenpilot_core::error::SessionError;
use screenpilot_core::session::{Session, SessionStatus, SessionStore, Task};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> Result<(), SessionError> {
        self.sessions.write().await.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        session.status = status;
        Ok(())
    }

    async fn begin_task(&self, session_id: &str) -> Result<(), SessionError> {
        // Check and set under one write guard.
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        match session.status {
            SessionStatus::Idle | SessionStatus::Queued => {
                session.status = SessionStatus::Running;
                Ok(())
            }
            SessionStatus::Running => Err(SessionError::Busy {
                session_id: session_id.to_string(),
                status: session.status.to_string(),
            }),
            SessionStatus::Stopped => Err(SessionError::Stopped(session_id.to_string())),
        }
    }

    async fn finish_task(&self, session_id: &str, task: Task) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        session.tasks.push(task);
        if session.status == SessionStatus::Running {
            session.status = SessionStatus::Idle;
        }
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.write().await.remove(session_id))
    }
}
