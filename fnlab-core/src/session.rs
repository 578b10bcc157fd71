//! Decomposed submissions, kept in a bounded in-memory cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::decomposer::CodeElements;

pub type SessionId = String;

/// One decomposed submission; immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub source: String,
    pub elements: CodeElements,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(source: impl Into<String>, elements: CodeElements) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            elements,
            created_at: Utc::now(),
        }
    }
}

/// Process-wide session map with capacity and time-to-live eviction.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<SessionId, Arc<Session>>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(config.max_sessions)
                .time_to_live(config.ttl)
                .build(),
        }
    }

    pub fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id)
    }

    /// Approximate; pending evictions are applied first.
    pub fn len(&self) -> u64 {
        self.sessions.run_pending_tasks();
        self.sessions.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}
