//! Per-session conversation history with a fixed turn cap.
//!
//! Each session sits behind its own async mutex so that two requests for the
//! same session id are applied one after the other, while different sessions
//! proceed independently.

use crate::models::{Role, Turn};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_SESSION_ID: &str = "default";

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug)]
pub struct Session {
    turns: VecDeque<Turn>,
    cap: usize,
}

impl Session {
    fn new(cap: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            cap,
        }
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push_back(Turn::new(role, content));
        while self.turns.len() > self.cap {
            self.turns.pop_front();
        }
    }

    /// The last `max_turns` turns, oldest first.
    pub fn recent(&self, max_turns: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(max_turns);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

pub type SessionGuard = OwnedMutexGuard<Session>;

pub struct SessionStore {
    cap: usize,
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    async fn handle(&self, session_id: &str) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.sessions.read().await.get(session_id) {
            return existing.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "created session");
                Arc::new(Mutex::new(Session::new(self.cap)))
            })
            .clone()
    }

    /// Locks the session, creating it on first use. The guard keeps other
    /// requests for the same id waiting until it is dropped.
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        self.handle(session_id).await.lock_owned().await
    }

    pub async fn append(&self, session_id: &str, role: Role, content: impl Into<String>) {
        self.lock(session_id).await.append(role, content);
    }

    pub async fn recent(&self, session_id: &str, max_turns: usize) -> Vec<Turn> {
        self.lock(session_id).await.recent(max_turns)
    }

    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        self.lock(session_id).await.turns()
    }

    /// Removes the session entirely. Returns whether it existed.
    pub async fn clear(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id);
        if let Some(handle) = &removed {
            // Wait out an in-flight request so its append lands before the reset.
            handle.lock().await.turns.clear();
        }
        debug!(session_id, existed = removed.is_some(), "cleared session");
        removed.is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(crate::models::RagOptions::default().history_cap)
    }
}
