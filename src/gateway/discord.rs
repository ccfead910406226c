//! Discord gateway implementation.
//!
//! REST for command registration and message delivery, the Gateway
//! WebSocket for real-time events.

use super::{
    CommandSpec, Gateway, GatewayError, GatewayEvent, GatewayResult, IncomingMessage, Invocation,
};
use crate::session::EntityRef;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const API_BASE: &str = "https://discord.com/api/v10";

// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT | DIRECT_MESSAGES
const GATEWAY_INTENTS: u64 = 33281;

/// Discord connection: REST client plus the Gateway WebSocket event loop.
pub struct DiscordGateway {
    bot_token: String,
    application_id: String,
    bot_user: EntityRef,
    client: Client,
}

impl DiscordGateway {
    /// Verifies the bot token and resolves the application identity.
    pub async fn connect(bot_token: String) -> GatewayResult<Self> {
        let client = Client::new();

        let me: Value = get_json(&client, &bot_token, &format!("{API_BASE}/users/@me"))
            .await
            .map_err(|e| GatewayError::Auth(format!("failed to verify bot token: {e}")))?;
        let bot_user = EntityRef::new(str_at(&me, &["username"]), str_at(&me, &["id"]));

        let app: Value = get_json(
            &client,
            &bot_token,
            &format!("{API_BASE}/oauth2/applications/@me"),
        )
        .await?;
        let application_id = str_at(&app, &["id"]);
        if application_id.is_empty() {
            return Err(GatewayError::Protocol("application id missing".into()));
        }

        tracing::info!(bot = %bot_user.name, "Discord connection verified");
        Ok(Self {
            bot_token,
            application_id,
            bot_user,
            client,
        })
    }

    /// The bot's own user identity.
    pub fn bot_user(&self) -> &EntityRef {
        &self.bot_user
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn post_json(&self, url: &str, body: &Value) -> GatewayResult<Value> {
        let resp = self
            .client
            .post(url)
            .header("Authorization", self.auth())
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        resp.json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))
    }

    /// Runs the Gateway WebSocket loop, emitting events until the
    /// connection closes or the receiver goes away.
    pub async fn run(&self, tx: mpsc::Sender<GatewayEvent>) -> GatewayResult<()> {
        let gw: Value = get_json(&self.client, &self.bot_token, &format!("{API_BASE}/gateway/bot")).await?;
        let gw_url = gw
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or("wss://gateway.discord.gg");

        let ws_url = format!("{gw_url}/?v=10&encoding=json");
        tracing::info!("Discord: connecting to gateway");

        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|e| GatewayError::Connection(format!("WebSocket connection failed: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        // Hello (opcode 10) carries the heartbeat interval.
        let hello = read
            .next()
            .await
            .ok_or_else(|| GatewayError::Connection("no hello from gateway".into()))?
            .map_err(|e| GatewayError::Connection(format!("WebSocket error: {e}")))?;
        let hello: Value = serde_json::from_str(&hello.to_string())
            .map_err(|e| GatewayError::Protocol(format!("invalid hello: {e}")))?;
        let heartbeat_interval = hello
            .get("d")
            .and_then(|d| d.get("heartbeat_interval"))
            .and_then(Value::as_u64)
            .unwrap_or(41250);

        // Identify (opcode 2).
        let identify = json!({
            "op": 2,
            "d": {
                "token": self.bot_token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": "linux",
                    "browser": "parley-bot",
                    "device": "parley-bot"
                }
            }
        });
        write
            .send(Message::Text(identify.to_string()))
            .await
            .map_err(|e| GatewayError::Connection(format!("failed to identify: {e}")))?;

        tracing::info!("Discord: connected and identified");

        let (hb_tx, mut hb_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_millis(heartbeat_interval));
            loop {
                interval.tick().await;
                if hb_tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                _ = hb_rx.recv() => {
                    let hb = json!({"op": 1, "d": null});
                    if write.send(Message::Text(hb.to_string())).await.is_err() {
                        break;
                    }
                }
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(Message::Text(t))) => t,
                        Some(Ok(Message::Close(_))) | None => break,
                        _ => continue,
                    };

                    let event: Value = match serde_json::from_str(&msg) {
                        Ok(e) => e,
                        Err(_) => continue,
                    };

                    let Some(event) = parse_event(&event, &self.bot_user.id) else {
                        continue;
                    };

                    if tx.send(event).await.is_err() {
                        // Receiver dropped: shutdown in progress.
                        break;
                    }
                }
            }
        }

        tracing::info!("Discord: gateway connection closed");
        Ok(())
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    async fn create_command(&self, spec: &CommandSpec) -> GatewayResult<String> {
        let url = format!("{API_BASE}/applications/{}/commands", self.application_id);
        let body = json!({
            "name": spec.name,
            "description": spec.description,
        });
        let created = self.post_json(&url, &body).await?;

        let id = str_at(&created, &["id"]);
        if id.is_empty() {
            return Err(GatewayError::Protocol("created command has no id".into()));
        }
        Ok(id)
    }

    async fn delete_command(&self, command_id: &str) -> GatewayResult<()> {
        let url = format!(
            "{API_BASE}/applications/{}/commands/{command_id}",
            self.application_id
        );
        let resp = self
            .client
            .delete(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn respond(&self, invocation: &Invocation, text: &str) -> GatewayResult<()> {
        // Type 4: channel message with source.
        let url = format!(
            "{API_BASE}/interactions/{}/{}/callback",
            invocation.id, invocation.token
        );
        let body = json!({
            "type": 4,
            "data": { "content": text }
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> GatewayResult<String> {
        let url = format!("{API_BASE}/channels/{channel_id}/messages");
        let sent = self.post_json(&url, &json!({ "content": text })).await?;
        Ok(str_at(&sent, &["id"]))
    }

    async fn channel_info(&self, channel_id: &str) -> GatewayResult<EntityRef> {
        let channel = get_json(
            &self.client,
            &self.bot_token,
            &format!("{API_BASE}/channels/{channel_id}"),
        )
        .await?;
        // DM channels carry no name.
        Ok(EntityRef::new(str_at(&channel, &["name"]), str_at(&channel, &["id"])))
    }

    async fn guild_info(&self, guild_id: &str) -> GatewayResult<EntityRef> {
        let guild = get_json(
            &self.client,
            &self.bot_token,
            &format!("{API_BASE}/guilds/{guild_id}"),
        )
        .await?;
        Ok(EntityRef::new(str_at(&guild, &["name"]), str_at(&guild, &["id"])))
    }
}

async fn get_json(client: &Client, bot_token: &str, url: &str) -> GatewayResult<Value> {
    let resp = client
        .get(url)
        .header("Authorization", format!("Bot {bot_token}"))
        .send()
        .await
        .map_err(|e| GatewayError::Request(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(GatewayError::Api {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }

    resp.json()
        .await
        .map_err(|e| GatewayError::Protocol(e.to_string()))
}

/// Navigates a JSON path, returning an owned string ("" when absent).
fn str_at(value: &Value, path: &[&str]) -> String {
    let mut current = value;
    for key in path {
        match current.get(key) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    current.as_str().unwrap_or_default().to_string()
}

/// Maps a raw gateway dispatch payload to a [`GatewayEvent`].
fn parse_event(event: &Value, bot_user_id: &str) -> Option<GatewayEvent> {
    let event_type = event.get("t").and_then(Value::as_str).unwrap_or("");
    let d = event.get("d")?;

    match event_type {
        "READY" => {
            let user = d.get("user")?;
            Some(GatewayEvent::Ready {
                user: EntityRef::new(str_at(user, &["username"]), str_at(user, &["id"])),
            })
        }
        "MESSAGE_CREATE" => Some(GatewayEvent::MessageReceived(parse_message(
            d,
            bot_user_id,
        )?)),
        "INTERACTION_CREATE" => Some(GatewayEvent::InvocationReceived(parse_invocation(d)?)),
        _ => None,
    }
}

fn parse_message(d: &Value, bot_user_id: &str) -> Option<IncomingMessage> {
    let author = d.get("author")?;
    let content = str_at(d, &["content"]);
    if content.is_empty() {
        return None;
    }

    let mentions_bot = d
        .get("mentions")
        .and_then(Value::as_array)
        .is_some_and(|mentions| {
            mentions
                .iter()
                .any(|m| m.get("id").and_then(Value::as_str) == Some(bot_user_id))
        });

    Some(IncomingMessage {
        id: str_at(d, &["id"]),
        channel_id: str_at(d, &["channel_id"]),
        author: EntityRef::new(str_at(author, &["username"]), str_at(author, &["id"])),
        author_is_bot: author.get("bot").and_then(Value::as_bool).unwrap_or(false),
        content,
        mentions_bot,
    })
}

fn parse_invocation(d: &Value) -> Option<Invocation> {
    // Type 2: application command.
    if d.get("type").and_then(Value::as_u64) != Some(2) {
        return None;
    }

    let command = str_at(d, &["data", "name"]);
    if command.is_empty() {
        return None;
    }

    // Guild invocations carry the invoker under member.user, DMs under user.
    let user = d
        .get("member")
        .and_then(|m| m.get("user"))
        .or_else(|| d.get("user"))?;

    Some(Invocation {
        id: str_at(d, &["id"]),
        token: str_at(d, &["token"]),
        command,
        channel_id: str_at(d, &["channel_id"]),
        guild_id: str_at(d, &["guild_id"]),
        user: EntityRef::new(str_at(user, &["username"]), str_at(user, &["id"])),
    })
}
