//! Platform connection abstraction.
//!
//! The core never talks to Discord directly; it consumes the [`Gateway`]
//! capability for outbound calls and receives inbound traffic as
//! [`GatewayEvent`]s over a channel. [`discord::DiscordGateway`] is the
//! production implementation.

pub mod discord;

#[cfg(test)]
pub(crate) mod testing;

pub use discord::DiscordGateway;

use crate::session::EntityRef;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed gateway payload: {0}")]
    Protocol(String),
}

/// Schema of a remote command definition, as registered with the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// An inbound command invocation: the command name plus everything needed
/// to identify the invoker and answer them.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: String,
    pub token: String,
    pub command: String,
    pub channel_id: String,
    /// Empty when invoked from a direct-message channel.
    pub guild_id: String,
    pub user: EntityRef,
}

/// An inbound chat message.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: String,
    pub channel_id: String,
    pub author: EntityRef,
    pub author_is_bot: bool,
    pub content: String,
    /// True when the message mentions the bot user.
    pub mentions_bot: bool,
}

/// Events emitted by a gateway connection.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// The connection is identified and ready.
    Ready { user: EntityRef },
    /// A command invocation arrived.
    InvocationReceived(Invocation),
    /// A chat message arrived.
    MessageReceived(IncomingMessage),
}

/// Outbound platform operations consumed by the core.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Registers a command definition remotely; returns the platform-assigned id.
    async fn create_command(&self, spec: &CommandSpec) -> GatewayResult<String>;

    /// Deletes a previously registered command definition.
    async fn delete_command(&self, command_id: &str) -> GatewayResult<()>;

    /// Answers a command invocation with a plain text response.
    async fn respond(&self, invocation: &Invocation, text: &str) -> GatewayResult<()>;

    /// Sends a message into a channel; returns the message id.
    async fn send_message(&self, channel_id: &str, text: &str) -> GatewayResult<String>;

    /// Looks up a channel's display name and id.
    async fn channel_info(&self, channel_id: &str) -> GatewayResult<EntityRef>;

    /// Looks up a guild's display name and id.
    async fn guild_info(&self, guild_id: &str) -> GatewayResult<EntityRef>;
}
