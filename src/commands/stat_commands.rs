//! The `/stats` diagnostic command set.

use super::{Command, CommandContext, CommandMap, CommandSet};
use crate::gateway::{CommandSpec, Invocation};
use crate::session::SessionRegistry;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Read-only session census consumed by the stats handler.
pub trait SessionCensus: Send + Sync {
    fn active_count(&self) -> usize;
}

impl SessionCensus for SessionRegistry {
    fn active_count(&self) -> usize {
        SessionRegistry::active_count(self)
    }
}

/// Handler set for instance diagnostics.
pub struct StatCommands {
    pub sessions: Arc<dyn SessionCensus>,
    started_at: DateTime<Utc>,
}

impl StatCommands {
    pub fn new(sessions: Arc<dyn SessionCensus>) -> Self {
        Self {
            sessions,
            started_at: Utc::now(),
        }
    }
}

impl CommandSet for StatCommands {
    fn commands(&self) -> CommandMap<Self> {
        CommandMap::from([(
            "stats",
            Command {
                spec: CommandSpec {
                    name: "stats",
                    description: "Gives you infos about the current instance of the bot",
                },
                handler: get_stats_handler,
            },
        )])
    }
}

fn get_stats_handler<'a>(
    ctx: &'a CommandContext<StatCommands>,
    invocation: &'a Invocation,
) -> BoxFuture<'a, ()> {
    Box::pin(get_stats(ctx, invocation))
}

async fn get_stats(ctx: &CommandContext<StatCommands>, invocation: &Invocation) {
    let uptime = Utc::now() - ctx.handlers.started_at;
    let text = format!(
        "parley-bot v{} | uptime: {}m | active sessions: {}",
        env!("CARGO_PKG_VERSION"),
        uptime.num_minutes(),
        ctx.handlers.sessions.active_count()
    );

    if let Err(e) = ctx.gateway.respond(invocation, &text).await {
        tracing::warn!(error = %e, "failed to deliver stats reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::RecordingGateway;
    use crate::session::EntityRef;

    struct FixedCensus(usize);

    impl SessionCensus for FixedCensus {
        fn active_count(&self) -> usize {
            self.0
        }
    }

    fn invocation() -> Invocation {
        Invocation {
            id: "i1".into(),
            token: "tok".into(),
            command: "stats".into(),
            channel_id: "c1".into(),
            guild_id: "g1".into(),
            user: EntityRef::new("alice", "u1"),
        }
    }

    #[tokio::test]
    async fn stats_reports_version_and_session_count() {
        let gateway = Arc::new(RecordingGateway::default());
        let ctx = CommandContext::register(
            gateway.clone(),
            StatCommands::new(Arc::new(FixedCensus(3))),
        )
        .await
        .expect("register");

        ctx.dispatch(&invocation()).await;

        let responses = gateway.response_texts();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].contains(env!("CARGO_PKG_VERSION")));
        assert!(responses[0].contains("active sessions: 3"));
    }

    #[tokio::test]
    async fn registers_exactly_one_command() {
        let gateway = Arc::new(RecordingGateway::default());
        let ctx = CommandContext::register(
            gateway.clone(),
            StatCommands::new(Arc::new(FixedCensus(0))),
        )
        .await
        .expect("register");

        assert_eq!(gateway.created_ids().len(), 1);

        ctx.delete_commands().await.expect("delete");
        assert_eq!(gateway.deleted_ids(), gateway.created_ids());
    }
}
