//! The `/session` and `/end` command set.

use super::{Command, CommandContext, CommandMap, CommandSet};
use crate::gateway::{CommandSpec, Invocation};
use crate::session::registry::SessionError;
use crate::session::{Session, SessionOptions, SessionRegistry};
use futures_util::future::BoxFuture;
use std::sync::Arc;

pub const SESSION_STARTED_REPLY: &str =
    "A session was started. Use /end to close it. It will close automatically if you stop interacting.";
pub const SESSION_IN_PROGRESS_REPLY: &str = "A session is already in progress in this channel.";
pub const NO_ACTIVE_SESSION_REPLY: &str = "No session is active in this channel.";
pub const SESSION_ENDED_REPLY: &str = "The session was ended.";

/// Session lifecycle capability consumed by the command handlers.
pub trait SessionManager: Send + Sync {
    fn push_new_session(&self, opts: SessionOptions) -> Result<(), SessionError>;
    fn get_session(&self, channel_id: &str) -> Option<Arc<Session>>;
    fn end_session(&self, channel_id: &str);
}

impl SessionManager for SessionRegistry {
    fn push_new_session(&self, opts: SessionOptions) -> Result<(), SessionError> {
        SessionRegistry::push_new_session(self, opts)
    }

    fn get_session(&self, channel_id: &str) -> Option<Arc<Session>> {
        SessionRegistry::get_session(self, channel_id)
    }

    fn end_session(&self, channel_id: &str) {
        SessionRegistry::end_session(self, channel_id);
    }
}

/// Handler set owning the session lifecycle commands.
pub struct SessionCommands {
    pub sessions: Arc<dyn SessionManager>,
}

impl SessionCommands {
    pub fn new(sessions: Arc<dyn SessionManager>) -> Self {
        Self { sessions }
    }
}

impl CommandSet for SessionCommands {
    fn commands(&self) -> CommandMap<Self> {
        CommandMap::from([
            (
                "session",
                Command {
                    spec: CommandSpec {
                        name: "session",
                        description: "Starts a new session with the bot",
                    },
                    handler: start_session_handler,
                },
            ),
            (
                "end",
                Command {
                    spec: CommandSpec {
                        name: "end",
                        description: "Ends an active session",
                    },
                    handler: end_session_handler,
                },
            ),
        ])
    }
}

fn start_session_handler<'a>(
    ctx: &'a CommandContext<SessionCommands>,
    invocation: &'a Invocation,
) -> BoxFuture<'a, ()> {
    Box::pin(start_session(ctx, invocation))
}

fn end_session_handler<'a>(
    ctx: &'a CommandContext<SessionCommands>,
    invocation: &'a Invocation,
) -> BoxFuture<'a, ()> {
    Box::pin(end_session(ctx, invocation))
}

/// Handles `/session`: starts a new session in the invoking channel.
async fn start_session(ctx: &CommandContext<SessionCommands>, invocation: &Invocation) {
    let channel = match ctx.gateway.channel_info(&invocation.channel_id).await {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!(error = %e, "channel lookup failed");
            ctx.handle_error(invocation).await;
            return;
        }
    };

    let opts = if invocation.guild_id.is_empty() {
        SessionOptions::in_channel(channel).as_direct_message(invocation.user.clone())
    } else {
        match ctx.gateway.guild_info(&invocation.guild_id).await {
            Ok(guild) => {
                SessionOptions::in_channel(channel).in_guild(invocation.user.clone(), guild)
            }
            Err(e) => {
                tracing::warn!(error = %e, "guild lookup failed");
                ctx.handle_error(invocation).await;
                return;
            }
        }
    };

    if let Err(SessionError::InProgress) = ctx.handlers.sessions.push_new_session(opts) {
        // Contention is not a failure; just tell the invoker.
        if let Err(e) = ctx
            .gateway
            .respond(invocation, SESSION_IN_PROGRESS_REPLY)
            .await
        {
            tracing::warn!(error = %e, "failed to deliver contention reply");
        }
        return;
    }

    if let Err(e) = ctx.gateway.respond(invocation, SESSION_STARTED_REPLY).await {
        // The invoker never saw the confirmation; take the session back.
        tracing::warn!(error = %e, "failed to confirm session start, rolling back");
        ctx.handlers.sessions.end_session(&invocation.channel_id);
    }
}

/// Handles `/end`: terminates the channel's running session.
async fn end_session(ctx: &CommandContext<SessionCommands>, invocation: &Invocation) {
    if ctx
        .handlers
        .sessions
        .get_session(&invocation.channel_id)
        .is_none()
    {
        if let Err(e) = ctx
            .gateway
            .respond(invocation, NO_ACTIVE_SESSION_REPLY)
            .await
        {
            tracing::warn!(error = %e, "failed to deliver reply");
        }
        return;
    }

    ctx.handlers.sessions.end_session(&invocation.channel_id);
    if let Err(e) = ctx.gateway.respond(invocation, SESSION_ENDED_REPLY).await {
        tracing::warn!(error = %e, "failed to deliver reply");
    }
}
