//! Inbound chat-message handling.
//!
//! Bridges gateway message events into the active session for the channel:
//! appends the user turn, asks the bot client for a reply, and forwards it.
//! A failed reply (production or delivery) ends the session instead of
//! retrying.

use crate::gateway::{Gateway, IncomingMessage};
use crate::session::{ChatMessage, Session, SessionRegistry};
use async_trait::async_trait;
use std::sync::Arc;

/// Channel notice sent when reply production fails.
pub const REPLY_FAILED_NOTICE: &str =
    "The bot had issues responding. The session is now closed.";

/// Session lookup capability consumed by the bridge.
pub trait Sessions: Send + Sync {
    fn get_session(&self, channel_id: &str) -> Option<Arc<Session>>;
    fn end_session(&self, channel_id: &str);
}

impl Sessions for SessionRegistry {
    fn get_session(&self, channel_id: &str) -> Option<Arc<Session>> {
        SessionRegistry::get_session(self, channel_id)
    }

    fn end_session(&self, channel_id: &str) {
        SessionRegistry::end_session(self, channel_id);
    }
}

/// Reply-producing collaborator: hands back a single synthesized message
/// for the session's current transcript.
#[async_trait]
pub trait BotClient: Send + Sync {
    async fn produce_reply(&self, session: &Session) -> anyhow::Result<ChatMessage>;
}

/// Routes inbound chat messages into sessions and replies back out.
pub struct MessageBridge {
    sessions: Arc<dyn Sessions>,
    bot: Arc<dyn BotClient>,
    gateway: Arc<dyn Gateway>,
    persona_keyword: String,
}

impl MessageBridge {
    pub fn new(
        sessions: Arc<dyn Sessions>,
        bot: Arc<dyn BotClient>,
        gateway: Arc<dyn Gateway>,
        persona: &str,
    ) -> Self {
        Self {
            sessions,
            bot,
            gateway,
            persona_keyword: persona.to_lowercase(),
        }
    }

    /// Handles one inbound message end to end. Callers spawn this per
    /// message so reply production never blocks event ingestion.
    pub async fn handle(&self, message: IncomingMessage) {
        if message.author_is_bot {
            return;
        }

        let Some(session) = self.sessions.get_session(&message.channel_id) else {
            return;
        };

        // Once more than one user is in the chat the bot only answers when
        // addressed, so it does not hijack the conversation.
        let participants = session.track_participant(&message.author);
        if participants > 1 && !self.addressed_to_bot(&message) {
            return;
        }

        tracing::info!(
            user = %message.author.name,
            channel = %message.channel_id,
            "session message received"
        );

        session.add_user_message(&message.author.name, &message.content);

        let reply = match self.bot.produce_reply(&session).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "reply production failed, closing session");
                if let Err(e) = self
                    .gateway
                    .send_message(&message.channel_id, REPLY_FAILED_NOTICE)
                    .await
                {
                    tracing::warn!(error = %e, "failed to deliver failure notice");
                }
                self.sessions.end_session(&message.channel_id);
                return;
            }
        };

        if let Err(e) = self
            .gateway
            .send_message(&message.channel_id, &reply.content)
            .await
        {
            tracing::error!(error = %e, "reply delivery failed, closing session");
            self.sessions.end_session(&message.channel_id);
        }
    }

    fn addressed_to_bot(&self, message: &IncomingMessage) -> bool {
        message.mentions_bot
            || message
                .content
                .to_lowercase()
                .contains(&self.persona_keyword)
    }
}
