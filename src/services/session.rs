use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::ConversationState;

/// Keyed conversation-state store. The state machine only ever sees
/// this interface, so a multi-instance deployment can swap the
/// in-process map for an external cache without touching it.
///
/// Each entry carries its own async mutex; holding it for a full turn
/// serializes turns per chat identity. Tokio's mutex is fair, so
/// rapid double-sends from one user are processed in arrival order.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session for this chat, creating an empty one on
    /// first contact.
    async fn get_or_create(&self, chat_id: &str) -> Arc<Mutex<ConversationState>>;

    /// Resets pending_action and context only; history and the
    /// resolved customer survive.
    async fn clear(&self, chat_id: &str);
}

#[derive(Default)]
pub struct InMemorySessions {
    inner: std::sync::Mutex<HashMap<String, Arc<Mutex<ConversationState>>>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn get_or_create(&self, chat_id: &str) -> Arc<Mutex<ConversationState>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(chat_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(chat_id, "created conversation state");
                Arc::new(Mutex::new(ConversationState::default()))
            })
            .clone()
    }

    async fn clear(&self, chat_id: &str) {
        let entry = {
            let map = self.inner.lock().unwrap();
            map.get(chat_id).cloned()
        };
        if let Some(entry) = entry {
            // Waits behind any in-flight turn for this chat.
            entry.lock().await.clear_pending();
        }
    }
}
