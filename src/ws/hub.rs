use axum::extract::ws::Message;
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Publish/subscribe rooms keyed by chat id.
///
/// Thread-safe via `DashMap`; designed to be wrapped in `Arc` and shared
/// across the application. Delivery is at-most-once: connections whose
/// send channels are closed are skipped, and a disconnected recipient
/// recovers by re-fetching the chat over HTTP.
#[derive(Default)]
pub struct ChatHub {
    rooms: DashMap<String, HashMap<String, WsSender>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a chat room.
    pub fn join(&self, chat_id: &str, conn_id: &str, sender: WsSender) {
        self.rooms
            .entry(chat_id.to_string())
            .or_default()
            .insert(conn_id.to_string(), sender);
    }

    /// Remove a connection from every room it joined, dropping rooms that
    /// become empty.
    pub fn leave_all(&self, conn_id: &str) {
        self.rooms.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
    }

    /// Send a message to every member of a room. Returns the number of
    /// connections the message was handed to.
    pub fn broadcast(&self, chat_id: &str, message: Message) -> usize {
        let Some(members) = self.rooms.get(chat_id) else {
            return 0;
        };

        let mut count = 0;
        for sender in members.values() {
            if sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    pub fn room_size(&self, chat_id: &str) -> usize {
        self.rooms.get(chat_id).map(|m| m.len()).unwrap_or(0)
    }
}
