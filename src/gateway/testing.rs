//! Recording gateway double for tests.

use super::{CommandSpec, Gateway, GatewayError, GatewayResult, Invocation};
use crate::session::EntityRef;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory [`Gateway`] that records every outbound call.
#[derive(Default)]
pub(crate) struct RecordingGateway {
    /// (command name, assigned id) per create call.
    pub created: Mutex<Vec<(String, String)>>,
    /// Command ids passed to delete calls.
    pub deleted: Mutex<Vec<String>>,
    /// (invocation id, text) per respond call.
    pub responses: Mutex<Vec<(String, String)>>,
    /// (channel id, text) per send call.
    pub sent: Mutex<Vec<(String, String)>>,
    pub next_id: AtomicUsize,
    /// Command name whose registration should fail.
    pub fail_create: Option<String>,
    pub fail_respond: bool,
    pub fail_send: bool,
    pub fail_lookups: bool,
}

impl RecordingGateway {
    pub fn created_ids(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn response_texts(&self) -> Vec<String> {
        self.responses
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn create_command(&self, spec: &CommandSpec) -> GatewayResult<String> {
        if self.fail_create.as_deref() == Some(spec.name) {
            return Err(GatewayError::Api {
                status: 403,
                message: "registration rejected".into(),
            });
        }
        let id = format!("cmd-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.created
            .lock()
            .unwrap()
            .push((spec.name.to_string(), id.clone()));
        Ok(id)
    }

    async fn delete_command(&self, command_id: &str) -> GatewayResult<()> {
        self.deleted.lock().unwrap().push(command_id.to_string());
        Ok(())
    }

    async fn respond(&self, invocation: &Invocation, text: &str) -> GatewayResult<()> {
        if self.fail_respond {
            return Err(GatewayError::Request("respond failed".into()));
        }
        self.responses
            .lock()
            .unwrap()
            .push((invocation.id.clone(), text.to_string()));
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> GatewayResult<String> {
        if self.fail_send {
            return Err(GatewayError::Request("send failed".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok("m1".into())
    }

    async fn channel_info(&self, channel_id: &str) -> GatewayResult<EntityRef> {
        if self.fail_lookups {
            return Err(GatewayError::Api {
                status: 404,
                message: "unknown channel".into(),
            });
        }
        Ok(EntityRef::new("general", channel_id))
    }

    async fn guild_info(&self, guild_id: &str) -> GatewayResult<EntityRef> {
        if self.fail_lookups {
            return Err(GatewayError::Api {
                status: 404,
                message: "unknown guild".into(),
            });
        }
        Ok(EntityRef::new("testers", guild_id))
    }
}
