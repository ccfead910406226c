//! Persona-driven reply production.
//!
//! Turns a session transcript into a completion prompt, asks the configured
//! provider for the persona's next line, and appends it to the session.

use crate::bridge::BotClient;
use crate::provider::Provider;
use crate::session::{ChatMessage, Session};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces in-character replies for active sessions.
pub struct PersonaClient {
    provider: Arc<dyn Provider>,
    persona: String,
    model: String,
    max_tokens: u32,
}

impl PersonaClient {
    pub fn new(
        provider: Arc<dyn Provider>,
        persona: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            persona: persona.into(),
            model: model.into(),
            max_tokens,
        }
    }

    /// Builds the completion prompt: a short scene header followed by the
    /// transcript so far, ending on an open line for the persona to fill.
    fn prompt(&self, session: &Session) -> String {
        let mut prompt = format!("You are {} in a Discord conversation.\n", self.persona);
        if !session.in_dm {
            prompt.push_str(&format!("Server: {}\n", session.guild.name));
        }
        prompt.push_str(&format!("Session Owner: {}\n", session.creator.name));
        prompt.push_str(&session.transcript());
        prompt.push_str(&format!("{}: ", self.persona));
        prompt
    }
}

#[async_trait]
impl BotClient for PersonaClient {
    async fn produce_reply(&self, session: &Session) -> anyhow::Result<ChatMessage> {
        let prompt = self.prompt(session);
        tracing::debug!(
            provider = self.provider.name(),
            model = %self.model,
            "requesting completion"
        );

        let completion = self
            .provider
            .complete(&prompt, &self.model, self.max_tokens)
            .await?;

        let content = completion.trim();
        if content.is_empty() {
            anyhow::bail!("provider returned an empty completion");
        }

        Ok(session.add_bot_message(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{EntityRef, SessionLimits};
    use std::sync::Mutex;

    struct CapturingProvider {
        prompts: Mutex<Vec<String>>,
        reply: &'static str,
    }

    #[async_trait]
    impl Provider for CapturingProvider {
        fn name(&self) -> &str {
            "capturing"
        }

        async fn complete(
            &self,
            prompt: &str,
            _model: &str,
            _max_tokens: u32,
        ) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.to_string())
        }
    }

    fn guild_session() -> Session {
        Session::new(
            EntityRef::new("alice", "u1"),
            EntityRef::new("general", "c1"),
            EntityRef::new("testers", "g1"),
            false,
            "Parley",
            SessionLimits::default(),
        )
    }

    #[tokio::test]
    async fn prompt_contains_scene_and_transcript() {
        let provider = Arc::new(CapturingProvider {
            prompts: Mutex::new(Vec::new()),
            reply: "hello alice",
        });
        let client = PersonaClient::new(provider.clone(), "Parley", "gpt-4o-mini", 256);
        let session = guild_session();
        session.add_user_message("alice", "hi");

        let reply = client.produce_reply(&session).await.expect("reply");
        assert_eq!(reply.content, "hello alice");
        assert!(reply.by_bot);

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            "You are Parley in a Discord conversation.\n\
             Server: testers\n\
             Session Owner: alice\n\
             alice: hi\n\
             Parley: "
        );
    }

    #[tokio::test]
    async fn dm_prompt_omits_server_line() {
        let provider = Arc::new(CapturingProvider {
            prompts: Mutex::new(Vec::new()),
            reply: "  trimmed  ",
        });
        let client = PersonaClient::new(provider.clone(), "Parley", "gpt-4o-mini", 256);
        let session = Session::new(
            EntityRef::new("alice", "u1"),
            EntityRef::new("dm", "c1"),
            EntityRef::default(),
            true,
            "Parley",
            SessionLimits::default(),
        );
        session.add_user_message("alice", "hi");

        let reply = client.produce_reply(&session).await.expect("reply");
        assert_eq!(reply.content, "trimmed");

        let prompts = provider.prompts.lock().unwrap();
        assert!(!prompts[0].contains("Server:"));
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let provider = Arc::new(CapturingProvider {
            prompts: Mutex::new(Vec::new()),
            reply: "   ",
        });
        let client = PersonaClient::new(provider, "Parley", "gpt-4o-mini", 256);
        let session = guild_session();
        session.add_user_message("alice", "hi");

        assert!(client.produce_reply(&session).await.is_err());
        // The failed turn must not pollute the transcript.
        assert_eq!(session.sent_count(), 1);
    }
}
