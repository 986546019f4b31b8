//! Chat panel controller: an append-only transcript over the chat endpoint.

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use shared::{
    domain::ChatRole,
    protocol::{ChatReply, ChatRequest},
};
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

/// Appended in place of the composing placeholder when the chat endpoint
/// cannot be reached or returns garbage. There is no retry.
pub const CHAT_FAILURE_APOLOGY: &str =
    "Sorry, I ran into a connection problem. Please try again.";

const PENDING_PLACEHOLDER: &str = "…";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatTurn {
    fn now(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            sent_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Full transcript snapshot after every mutation. The transcript is small
    /// (one kiosk session), so snapshots keep the UI side trivially correct.
    TranscriptUpdated(Vec<ChatTurn>),
}

pub struct ChatClient {
    http: Client,
    server_url: String,
    transcript: Mutex<Vec<ChatTurn>>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            http: Client::new(),
            server_url: server_url.into(),
            transcript: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub async fn transcript(&self) -> Vec<ChatTurn> {
        self.transcript.lock().await.clone()
    }

    /// Submit one user message. Whitespace-only input is a no-op. Otherwise
    /// the user turn and a composing placeholder are appended before the call
    /// goes out; the placeholder is replaced by the reply, or by the fixed
    /// apology on any failure.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let message = text.trim();
        if message.is_empty() {
            return Ok(());
        }

        {
            let mut transcript = self.transcript.lock().await;
            transcript.push(ChatTurn::now(ChatRole::User, message));
            transcript.push(ChatTurn::now(ChatRole::BotPending, PENDING_PLACEHOLDER));
            self.emit_snapshot(&transcript);
        }

        let bot_turn = match self.post_chat(message).await {
            Ok(reply) => ChatTurn::now(ChatRole::Bot, reply.reply),
            Err(err) => {
                warn!("chat: request failed: {err:#}");
                ChatTurn::now(ChatRole::Bot, CHAT_FAILURE_APOLOGY)
            }
        };

        let mut transcript = self.transcript.lock().await;
        transcript.retain(|turn| turn.role != ChatRole::BotPending);
        transcript.push(bot_turn);
        self.emit_snapshot(&transcript);
        Ok(())
    }

    async fn post_chat(&self, message: &str) -> Result<ChatReply> {
        let reply = self
            .http
            .post(format!("{}/api/chat", self.server_url))
            .json(&ChatRequest {
                message: message.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json::<ChatReply>()
            .await?;
        Ok(reply)
    }

    fn emit_snapshot(&self, transcript: &[ChatTurn]) {
        let _ = self
            .events
            .send(ChatEvent::TranscriptUpdated(transcript.to_vec()));
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
