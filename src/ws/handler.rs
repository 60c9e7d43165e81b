use crate::AppState;
use crate::services::chat;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Events a client may emit over the socket.
#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ClientEvent {
    JoinRoom {
        chat_id: String,
    },
    SendMessage {
        chat_id: String,
        sender_id: String,
        text: String,
    },
}

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), spawns a
/// sender task forwarding hub messages to the sink, and processes inbound
/// events on the current task. Cleans up room membership on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "WebSocket connected");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Message>();
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_event(&state, &conn_id, &tx, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.hub.leave_all(&conn_id);
    send_task.abort();
    info!(conn_id = %conn_id, "WebSocket disconnected");
}

async fn handle_event(
    state: &AppState,
    conn_id: &str,
    tx: &tokio::sync::mpsc::UnboundedSender<Message>,
    raw: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(raw) {
        Ok(event) => event,
        Err(e) => {
            debug!(conn_id = %conn_id, "Unparseable client event: {}", e);
            send_error(tx, "Unrecognized event");
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom { chat_id } => {
            state.hub.join(&chat_id, conn_id, tx.clone());
            debug!(conn_id = %conn_id, chat_id = %chat_id, "Joined room");
        }
        ClientEvent::SendMessage {
            chat_id,
            sender_id,
            text,
        } => {
            // Persist first; only a durably stored message is broadcast,
            // so live listeners never see one that a reload would lose.
            match chat::append_message(&state.db, &chat_id, &sender_id, &text).await {
                Ok(message) => {
                    let payload = json!({
                        "event": "receive_message",
                        "chat_id": chat_id,
                        "sender": message.sender_id,
                        "text": message.content,
                        "timestamp": message.created_at,
                    });
                    state.hub.broadcast(&chat_id, Message::Text(payload.to_string()));
                }
                Err(e) => {
                    warn!(chat_id = %chat_id, "Message persist failed: {}", e);
                    send_error(tx, "Failed to send message");
                }
            }
        }
    }
}

fn send_error(tx: &tokio::sync::mpsc::UnboundedSender<Message>, message: &str) {
    let payload = json!({ "event": "error", "message": message });
    let _ = tx.send(Message::Text(payload.to_string()));
}
