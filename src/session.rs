//! Statistics selection sessions.
//!
//! A session tracks one date-range → group-by selection on a single bot
//! message. It is keyed by [`ConversationKey`] (chat + message being edited),
//! so two menus in the same chat never interfere.
//!
//! Lifecycle:
//! - opened in [`SessionStage::AwaitingDateRange`] when the range menu is sent;
//! - moved to [`SessionStage::AwaitingGroupBy`] by a range tap (which also
//!   creates the session if it was never opened, e.g. after a restart);
//! - removed by the terminal group-by tap;
//! - purged once older than the store TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use teloxide::types::{ChatId, MessageId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::daterange::DateRange;
use crate::{Error, Result};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Chat + message pair identifying one in-progress selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl ConversationKey {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Idle,
    AwaitingDateRange,
    AwaitingGroupBy,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub stage: SessionStage,
    pub range: Option<DateRange>,
    touched: Instant,
}

impl Session {
    fn new(stage: SessionStage, range: Option<DateRange>) -> Self {
        Self {
            stage,
            range,
            touched: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.touched.elapsed() > ttl
    }
}

/// In-memory table of active sessions.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ConversationKey, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Idle → AwaitingDateRange, for the message carrying the range menu.
    pub async fn open(&self, key: ConversationKey) {
        self.insert(key, Session::new(SessionStage::AwaitingDateRange, None))
            .await;
    }

    /// Remember `range` for `key` and wait for a group-by tap. Supersedes any
    /// earlier selection on the same message.
    pub async fn select_range(&self, key: ConversationKey, range: DateRange) {
        self.insert(key, Session::new(SessionStage::AwaitingGroupBy, Some(range)))
            .await;
    }

    /// AwaitingGroupBy → Idle: remove the session and hand back its range.
    pub async fn take_range(&self, key: ConversationKey) -> Result<DateRange> {
        let session = self.sessions.write().await.remove(&key);
        match session {
            Some(s) if s.is_expired(self.ttl) => {
                debug!(?key, "Session expired");
                Err(Error::MissingSession)
            }
            Some(Session {
                stage: SessionStage::AwaitingGroupBy,
                range: Some(range),
                ..
            }) => Ok(range),
            _ => Err(Error::MissingSession),
        }
    }

    /// Stage for `key`; unknown or expired keys are `Idle`.
    pub async fn stage(&self, key: ConversationKey) -> SessionStage {
        self.sessions
            .read()
            .await
            .get(&key)
            .filter(|s| !s.is_expired(self.ttl))
            .map(|s| s.stage)
            .unwrap_or(SessionStage::Idle)
    }

    pub async fn get(&self, key: ConversationKey) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(&key)
            .filter(|s| !s.is_expired(self.ttl))
            .cloned()
    }

    /// Number of stored sessions, expired ones included until the next purge.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every session older than the TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl));
        before - sessions.len()
    }

    async fn insert(&self, key: ConversationKey, session: Session) {
        let mut sessions = self.sessions.write().await;
        let ttl = self.ttl;
        sessions.retain(|_, s| !s.is_expired(ttl));
        sessions.insert(key, session);
    }
}
