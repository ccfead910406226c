//! Conversation sessions with quota and time limits.
//!
//! A [`Session`] is one bounded conversation scoped to a channel. It owns a
//! fixed-capacity transcript buffer and expires when its message quota is
//! exhausted, its lifetime elapses, or it goes idle. Expiry is a sticky
//! latch: once a session has timed out it stays timed out until an explicit
//! [`Session::reset_timeout`].

pub mod registry;

pub use registry::{SessionOptions, SessionRegistry};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// A named platform entity (user, channel or guild).
///
/// Keeps only what the bot needs to identify and address the entity,
/// instead of retaining full platform objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRef {
    pub name: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

// Display names can change mid-session; the platform id is the identity.
impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityRef {}

/// A single transcript turn. Never mutated after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub by_bot: bool,
    pub author_name: String,
}

/// Limits bounding a session's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Maximum number of transcript turns (default: 100).
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,

    /// Absolute session lifetime in seconds (default: 20 minutes).
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    /// Inactivity timeout in seconds (default: 5 minutes).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_message_limit() -> usize {
    100
}

fn default_max_duration_secs() -> u64 {
    20 * 60
}

fn default_idle_timeout_secs() -> u64 {
    5 * 60
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            message_limit: default_message_limit(),
            max_duration_secs: default_max_duration_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl SessionLimits {
    fn max_duration(&self) -> Duration {
        Duration::seconds(self.max_duration_secs as i64)
    }

    fn idle_timeout(&self) -> Duration {
        Duration::seconds(self.idle_timeout_secs as i64)
    }
}

/// Mutable session state. Everything that can change after construction
/// lives behind one lock so concurrent append and expiry checks can never
/// observe a torn update.
#[derive(Debug)]
struct SessionState {
    last_interaction: DateTime<Utc>,
    covered: Duration,
    #[allow(dead_code)] // Placeholder for future session tiering.
    session_level: u8,
    users_in_chat: Vec<EntityRef>,
    timed_out: bool,
    messages: Vec<ChatMessage>,
}

/// One bounded conversation in a channel.
#[derive(Debug)]
pub struct Session {
    pub creator: EntityRef,
    pub channel: EntityRef,
    /// Empty when the session runs in a direct-message channel.
    pub guild: EntityRef,
    pub in_dm: bool,
    pub started_at: DateTime<Utc>,
    persona: String,
    limits: SessionLimits,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        creator: EntityRef,
        channel: EntityRef,
        guild: EntityRef,
        in_dm: bool,
        persona: impl Into<String>,
        limits: SessionLimits,
    ) -> Self {
        let now = Utc::now();
        let capacity = limits.message_limit;

        Self {
            creator: creator.clone(),
            channel,
            guild,
            in_dm,
            started_at: now,
            persona: persona.into(),
            limits,
            state: Mutex::new(SessionState {
                last_interaction: now,
                covered: Duration::zero(),
                session_level: 0,
                users_in_chat: vec![creator],
                timed_out: false,
                messages: Vec::with_capacity(capacity),
            }),
        }
    }

    /// Checks whether this session has expired, latching the result.
    ///
    /// A session expires when any of three conditions holds: the message
    /// quota is exhausted, the absolute lifetime has elapsed, or the idle
    /// timeout has elapsed. Once latched the session never comes back to
    /// life, even if the clock or the interaction state would no longer
    /// trip a condition.
    pub fn has_timed_out(&self) -> bool {
        let mut state = self.lock_state();
        if state.timed_out {
            return true;
        }

        let now = Utc::now();
        let since_interaction = now - state.last_interaction;
        if state.messages.len() >= self.limits.message_limit
            || since_interaction >= self.limits.max_duration()
            || since_interaction >= self.limits.idle_timeout()
        {
            state.timed_out = true;
            return true;
        }

        false
    }

    /// Clears the quota and the timeout latch so the session can continue.
    ///
    /// Not exercised by the default start/end flow; kept for explicit
    /// session continuation.
    pub fn reset_timeout(&self) {
        let mut state = self.lock_state();
        state.covered = Duration::zero();
        state.messages.clear();
        state.timed_out = false;
    }

    /// Appends a user turn to the transcript.
    ///
    /// Callers must have confirmed `has_timed_out() == false`; the quota
    /// gate lives there, not here.
    pub fn add_user_message(&self, author: &str, content: &str) {
        let mut state = self.lock_state();
        debug_assert!(
            state.messages.len() < self.limits.message_limit,
            "transcript capacity exceeded"
        );
        state.messages.push(ChatMessage {
            content: content.to_string(),
            by_bot: false,
            author_name: author.to_string(),
        });
        state.last_interaction = Utc::now();
    }

    /// Appends a bot turn to the transcript and returns it, so callers can
    /// forward the reply without re-reading the buffer.
    pub fn add_bot_message(&self, content: &str) -> ChatMessage {
        let mut state = self.lock_state();
        debug_assert!(
            state.messages.len() < self.limits.message_limit,
            "transcript capacity exceeded"
        );
        let message = ChatMessage {
            content: content.to_string(),
            by_bot: true,
            author_name: String::new(),
        };
        state.messages.push(message.clone());
        state.last_interaction = Utc::now();
        message
    }

    /// Ensures `user` is tracked as a participant and returns the
    /// participant count afterwards.
    pub fn track_participant(&self, user: &EntityRef) -> usize {
        let mut state = self.lock_state();
        if !state.users_in_chat.iter().any(|u| u == user) {
            state.users_in_chat.push(user.clone());
        }
        state.users_in_chat.len()
    }

    /// Number of turns appended so far.
    pub fn sent_count(&self) -> usize {
        self.lock_state().messages.len()
    }

    /// Renders the transcript in append order, one `name: content` line per
    /// turn. Bot turns are labeled with the persona; user turns with the
    /// stored author name. This is the conversation context handed to the
    /// reply producer.
    pub fn transcript(&self) -> String {
        let state = self.lock_state();
        let mut out = String::new();
        for message in &state.messages {
            let name = if message.by_bot {
                self.persona.as_str()
            } else {
                message.author_name.as_str()
            };
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&message.content);
            out.push('\n');
        }
        out
    }

    /// Immutable copy of the session for persistence.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            creator: self.creator.clone(),
            channel: self.channel.clone(),
            guild: self.guild.clone(),
            in_dm: self.in_dm,
            started_at: self.started_at,
            ended_at: Utc::now(),
            users_in_chat: state.users_in_chat.clone(),
            messages: state.messages.clone(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        // Appends and checks never panic while holding the lock; a poisoned
        // state would only follow a panic in this module itself.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Serializable record of a finished (or evicted) session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub creator: EntityRef,
    pub channel: EntityRef,
    pub guild: EntityRef,
    pub in_dm: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub users_in_chat: Vec<EntityRef>,
    pub messages: Vec<ChatMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(message_limit: usize) -> SessionLimits {
        SessionLimits {
            message_limit,
            max_duration_secs: 3600,
            idle_timeout_secs: 3600,
        }
    }

    fn make_session(message_limit: usize) -> Session {
        Session::new(
            EntityRef::new("alice", "u1"),
            EntityRef::new("general", "c1"),
            EntityRef::new("testers", "g1"),
            false,
            "Parley",
            limits(message_limit),
        )
    }

    #[test]
    fn entity_equality_is_by_id() {
        assert_eq!(EntityRef::new("old-name", "1"), EntityRef::new("new-name", "1"));
        assert_ne!(EntityRef::new("same", "1"), EntityRef::new("same", "2"));
    }

    #[test]
    fn transcript_preserves_order_and_labels() {
        let session = make_session(10);
        session.add_user_message("alice", "hi");
        session.add_bot_message("hello");
        session.add_user_message("bob", "bye");

        assert_eq!(session.transcript(), "alice: hi\nParley: hello\nbob: bye\n");
        assert_eq!(session.sent_count(), 3);
    }

    #[test]
    fn quota_exhaustion_latches_timeout() {
        let session = make_session(3);
        session.add_user_message("alice", "hi");
        session.add_bot_message("hello");
        assert!(!session.has_timed_out());

        session.add_user_message("alice", "bye");
        assert_eq!(session.transcript(), "alice: hi\nParley: hello\nalice: bye\n");
        assert_eq!(session.sent_count(), 3);
        assert!(session.has_timed_out());
    }

    #[test]
    fn idle_timeout_expires_fresh_session() {
        let session = Session::new(
            EntityRef::new("alice", "u1"),
            EntityRef::new("dm", "c1"),
            EntityRef::default(),
            true,
            "Parley",
            SessionLimits {
                message_limit: 10,
                max_duration_secs: 3600,
                idle_timeout_secs: 0,
            },
        );

        assert!(session.has_timed_out());
    }

    #[test]
    fn timeout_latch_survives_new_interactions() {
        let session = make_session(1);
        session.add_user_message("alice", "hi");
        assert!(session.has_timed_out());

        // The append refreshes last_interaction, but the latch holds even
        // though the buffer would be re-gated only through reset_timeout.
        assert!(session.has_timed_out());
    }

    #[test]
    fn reset_timeout_clears_latch_and_quota() {
        let session = make_session(1);
        session.add_user_message("alice", "hi");
        assert!(session.has_timed_out());

        session.reset_timeout();
        assert!(!session.has_timed_out());
        assert_eq!(session.sent_count(), 0);
        assert_eq!(session.transcript(), "");
    }

    #[test]
    fn track_participant_is_a_membership_set() {
        let session = make_session(10);
        let bob = EntityRef::new("bob", "u2");

        assert_eq!(session.track_participant(&session.creator.clone()), 1);
        assert_eq!(session.track_participant(&bob), 2);
        assert_eq!(session.track_participant(&bob), 2);
    }

    #[test]
    fn snapshot_captures_transcript() {
        let session = make_session(10);
        session.add_user_message("alice", "hi");
        session.add_bot_message("hello");

        let snapshot = session.snapshot();
        assert_eq!(snapshot.channel.id, "c1");
        assert_eq!(snapshot.messages.len(), 2);
        assert!(snapshot.messages[1].by_bot);
        assert!(snapshot.ended_at >= snapshot.started_at);

        let json = serde_json::to_string(&snapshot).expect("serialize");
        let parsed: SessionSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.messages.len(), 2);
    }

    #[test]
    fn limits_defaults() {
        let limits = SessionLimits::default();
        assert_eq!(limits.message_limit, 100);
        assert_eq!(limits.max_duration_secs, 20 * 60);
        assert_eq!(limits.idle_timeout_secs, 5 * 60);
    }
}
