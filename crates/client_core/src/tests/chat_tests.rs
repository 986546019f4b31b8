use super::*;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tokio::net::TcpListener;

#[derive(Clone)]
struct ChatServerState {
    reply: String,
    fail: bool,
    hits: Arc<AtomicU32>,
}

async fn handle_chat(
    State(state): State<ChatServerState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, StatusCode> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if state.fail {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert!(!request.message.trim().is_empty());
    Ok(Json(ChatReply {
        reply: state.reply.clone(),
    }))
}

async fn spawn_chat_server(reply: &str, fail: bool) -> anyhow::Result<(String, ChatServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ChatServerState {
        reply: reply.to_string(),
        fail,
        hits: Arc::new(AtomicU32::new(0)),
    };
    let app = Router::new()
        .route("/api/chat", post(handle_chat))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn roles(turns: &[ChatTurn]) -> Vec<ChatRole> {
    turns.iter().map(|turn| turn.role).collect()
}

#[tokio::test]
async fn hello_appends_user_turn_placeholder_then_reply() {
    let (server_url, _state) = spawn_chat_server("Hi! Ask me about fares.", false)
        .await
        .expect("spawn server");
    let client = ChatClient::new(server_url);
    let mut rx = client.subscribe_events();

    client.send_message("hello").await.expect("send");

    // First snapshot: user turn plus the composing placeholder.
    let ChatEvent::TranscriptUpdated(first) = rx.recv().await.expect("first snapshot");
    assert_eq!(roles(&first), vec![ChatRole::User, ChatRole::BotPending]);
    assert_eq!(first[0].text, "hello");

    // Second snapshot: placeholder replaced by the actual reply.
    let ChatEvent::TranscriptUpdated(second) = rx.recv().await.expect("second snapshot");
    assert_eq!(roles(&second), vec![ChatRole::User, ChatRole::Bot]);
    assert_eq!(second[1].text, "Hi! Ask me about fares.");

    let transcript = client.transcript().await;
    assert_eq!(roles(&transcript), vec![ChatRole::User, ChatRole::Bot]);
}

#[tokio::test]
async fn whitespace_only_input_produces_no_turn_and_no_request() {
    let (server_url, state) = spawn_chat_server("unused", false)
        .await
        .expect("spawn server");
    let client = ChatClient::new(server_url);

    client.send_message("   \t  ").await.expect("send");

    assert!(client.transcript().await.is_empty());
    assert_eq!(state.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn input_is_trimmed_before_submission() {
    let (server_url, _state) = spawn_chat_server("ok", false)
        .await
        .expect("spawn server");
    let client = ChatClient::new(server_url);

    client.send_message("  fares?  ").await.expect("send");

    let transcript = client.transcript().await;
    assert_eq!(transcript[0].text, "fares?");
}

#[tokio::test]
async fn transport_failure_replaces_placeholder_with_apology() {
    // Nothing listens on this port.
    let client = ChatClient::new("http://127.0.0.1:9");

    client.send_message("hello").await.expect("send");

    let transcript = client.transcript().await;
    assert_eq!(roles(&transcript), vec![ChatRole::User, ChatRole::Bot]);
    assert_eq!(transcript[1].text, CHAT_FAILURE_APOLOGY);
}

#[tokio::test]
async fn server_error_status_replaces_placeholder_with_apology() {
    let (server_url, state) = spawn_chat_server("unused", true)
        .await
        .expect("spawn server");
    let client = ChatClient::new(server_url);

    client.send_message("hello").await.expect("send");

    let transcript = client.transcript().await;
    assert_eq!(roles(&transcript), vec![ChatRole::User, ChatRole::Bot]);
    assert_eq!(transcript[1].text, CHAT_FAILURE_APOLOGY);
    assert_eq!(state.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transcript_is_append_only_across_exchanges() {
    let (server_url, _state) = spawn_chat_server("noted", false)
        .await
        .expect("spawn server");
    let client = ChatClient::new(server_url);

    client.send_message("first").await.expect("send first");
    client.send_message("second").await.expect("send second");

    let transcript = client.transcript().await;
    assert_eq!(
        roles(&transcript),
        vec![ChatRole::User, ChatRole::Bot, ChatRole::User, ChatRole::Bot]
    );
    assert_eq!(transcript[0].text, "first");
    assert_eq!(transcript[2].text, "second");
}
