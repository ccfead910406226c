//! Generic command registration and dispatch.
//!
//! A [`CommandSet`] produces a name-keyed map of command definitions and
//! handler functions. [`CommandContext::register`] creates the definitions
//! remotely and becomes the dispatcher for the set: invocations are routed
//! to handlers by name, and the collected remote ids are deleted again on
//! teardown. Several independent sets can share one event stream; each
//! dispatcher silently skips names it does not own.

pub mod session_commands;
pub mod stat_commands;

pub use session_commands::SessionCommands;
pub use stat_commands::StatCommands;

use crate::gateway::{CommandSpec, Gateway, GatewayError, Invocation};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Reply used when a handler cannot complete its contract.
pub const GENERIC_ERROR_REPLY: &str = "An error occurred. I cannot serve you at this time. Sorry.";

/// Handler function for one command. Handlers are plain `async fn`s wrapped
/// into this shape at the map literal.
pub type HandlerFn<H> = for<'a> fn(&'a CommandContext<H>, &'a Invocation) -> BoxFuture<'a, ()>;

/// A command definition: the remote schema plus its handler.
pub struct Command<H> {
    pub spec: CommandSpec,
    pub handler: HandlerFn<H>,
}

/// Name-keyed command definitions for one handler set.
pub type CommandMap<H> = HashMap<&'static str, Command<H>>;

/// A handler set: any type that can produce its command map. The set itself
/// carries whatever capabilities its handlers need.
pub trait CommandSet: Sized + Send + Sync {
    fn commands(&self) -> CommandMap<Self>;
}

/// Errors from command registration and teardown.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to register command {name}: {source}")]
    Registration {
        name: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("failed to delete command {name}: {source}")]
    Teardown {
        name: &'static str,
        #[source]
        source: GatewayError,
    },
}

struct RegisteredCommand {
    id: String,
    name: &'static str,
}

/// Dispatcher for one handler set.
///
/// Owns the remote ids it registered; per definition the lifecycle is
/// Unregistered -> Registered -> Deleted, with no re-registration short of
/// constructing a new context.
pub struct CommandContext<H> {
    pub handlers: H,
    pub gateway: Arc<dyn Gateway>,
    registered: Vec<RegisteredCommand>,
}

impl<H: CommandSet> CommandContext<H> {
    /// Registers every command in the set remotely and returns the
    /// dispatcher. The first registration failure aborts the whole call;
    /// already-created definitions are not rolled back.
    pub async fn register(gateway: Arc<dyn Gateway>, handlers: H) -> Result<Self, CommandError> {
        let commands = handlers.commands();
        let mut registered = Vec::with_capacity(commands.len());

        for command in commands.values() {
            let id = gateway
                .create_command(&command.spec)
                .await
                .map_err(|source| CommandError::Registration {
                    name: command.spec.name,
                    source,
                })?;
            registered.push(RegisteredCommand {
                id,
                name: command.spec.name,
            });
        }

        tracing::info!(count = registered.len(), "commands registered");
        Ok(Self {
            handlers,
            gateway,
            registered,
        })
    }

    /// Routes an invocation to its handler, synchronously on the calling
    /// task. Unknown names are skipped without logging: other dispatchers
    /// on the same event stream may own them.
    pub async fn dispatch(&self, invocation: &Invocation) {
        let commands = self.handlers.commands();
        let Some(command) = commands.get(invocation.command.as_str()) else {
            return;
        };

        tracing::info!(
            command = %invocation.command,
            user = %invocation.user.name,
            channel = %invocation.channel_id,
            "command invoked"
        );
        (command.handler)(self, invocation).await;
    }

    /// Deletes every previously registered remote definition. The first
    /// deletion failure aborts the teardown; callers log it and do not
    /// retry.
    pub async fn delete_commands(&self) -> Result<(), CommandError> {
        for command in &self.registered {
            self.gateway
                .delete_command(&command.id)
                .await
                .map_err(|source| CommandError::Teardown {
                    name: command.name,
                    source,
                })?;
        }

        tracing::info!(count = self.registered.len(), "commands deleted");
        Ok(())
    }

    /// Answers an invocation with the generic failure reply.
    pub async fn handle_error(&self, invocation: &Invocation) {
        if let Err(e) = self.gateway.respond(invocation, GENERIC_ERROR_REPLY).await {
            tracing::warn!(error = %e, "failed to deliver error response");
        }
    }
}
