//! Process-wide channel -> session registry.
//!
//! Enforces at most one active session per channel. Expiry is detected
//! lazily on access instead of by a background sweep: a timed-out entry is
//! evicted on the next lookup and handed to the [`Store`] on a spawned task.

use crate::session::{EntityRef, Session, SessionLimits};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by session lifecycle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The channel already has an unexpired session.
    #[error("a session is already in progress in this channel")]
    InProgress,
}

/// Describes how to construct a session: the channel it runs in, and the
/// participant shape (direct message or guild member). Not retained after
/// the session is created.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    channel: EntityRef,
    creator: EntityRef,
    guild: EntityRef,
    in_dm: bool,
}

impl SessionOptions {
    /// Starts building options for a session in `channel`.
    pub fn in_channel(channel: EntityRef) -> Self {
        Self {
            channel,
            ..Self::default()
        }
    }

    /// Marks the session as a direct-message conversation with `user`.
    pub fn as_direct_message(mut self, user: EntityRef) -> Self {
        self.creator = user;
        self.in_dm = true;
        self
    }

    /// Marks the session as a guild conversation started by `member`.
    pub fn in_guild(mut self, member: EntityRef, guild: EntityRef) -> Self {
        self.creator = member;
        self.guild = guild;
        self
    }
}

/// Creation, lookup and teardown of per-channel sessions.
///
/// The map itself is guarded by one mutex; session values are `Arc`-shared
/// so in-flight appends on one channel never contend with registry access
/// for another.
pub struct SessionRegistry {
    limits: SessionLimits,
    persona: String,
    store: Arc<dyn Store>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(limits: SessionLimits, persona: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Self {
            limits,
            persona: persona.into(),
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a session for the options' channel.
    ///
    /// Fails with [`SessionError::InProgress`] if the channel already has an
    /// unexpired session. An expired entry is replaced transparently.
    pub fn push_new_session(&self, opts: SessionOptions) -> Result<(), SessionError> {
        let mut sessions = self.lock_sessions();

        if let Some(existing) = sessions.get(&opts.channel.id) {
            if !existing.has_timed_out() {
                return Err(SessionError::InProgress);
            }
            sessions.remove(&opts.channel.id);
        }

        let channel_id = opts.channel.id.clone();
        let session = Session::new(
            opts.creator,
            opts.channel,
            opts.guild,
            opts.in_dm,
            self.persona.clone(),
            self.limits.clone(),
        );
        sessions.insert(channel_id, Arc::new(session));
        Ok(())
    }

    /// Returns the channel's session, or `None` if there is none.
    ///
    /// A timed-out entry is evicted here: it is removed from the map, its
    /// snapshot is handed to the store on a spawned task (fire-and-forget),
    /// and the lookup reports absence.
    pub fn get_session(&self, channel_id: &str) -> Option<Arc<Session>> {
        let mut sessions = self.lock_sessions();
        let session = sessions.get(channel_id)?;

        if session.has_timed_out() {
            tracing::info!(channel_id, "session timed out, evicting");
            let session = sessions.remove(channel_id)?;
            drop(sessions);

            let snapshot = session.snapshot();
            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.store(snapshot).await {
                    tracing::error!(error = %e, "failed to store evicted session");
                }
            });

            return None;
        }

        Some(session.clone())
    }

    /// Removes the channel's session unconditionally. No-op when absent.
    pub fn end_session(&self, channel_id: &str) {
        self.lock_sessions().remove(channel_id);
    }

    /// Number of sessions currently held (may include entries whose expiry
    /// has not been observed yet).
    pub fn active_count(&self) -> usize {
        self.lock_sessions().len()
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}
