use serde::{Deserialize, Serialize};

use crate::models::intent::IntentKind;

/// Rolling history keeps this many turns; oldest are dropped first.
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// Marker that the assistant is waiting for one specific piece of
/// clarification before it can finish a mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    AwaitingRescheduleSelection,
    AwaitingCancelSelection,
    AwaitingNewDateTime { appointment_id: i64 },
}

/// Per-chat mutable session. Exactly one exists per chat identity;
/// created on first contact, mutated every turn, never destroyed
/// (only `clear` resets the in-flight parts).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub customer_id: Option<i64>,
    pub history: Vec<ConversationTurn>,
    pub last_intent: Option<IntentKind>,
    pub pending_action: Option<PendingAction>,
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl ConversationState {
    pub fn push_turn(&mut self, role: &str, content: &str) {
        self.history.push(ConversationTurn {
            role: role.to_string(),
            content: content.to_string(),
        });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    /// Resets the in-flight operation. History and customer_id survive.
    pub fn clear_pending(&mut self) {
        self.pending_action = None;
        self.context.clear();
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(|v| v.as_str())
    }

    pub fn set_context(&mut self, key: &str, value: serde_json::Value) {
        self.context.insert(key.to_string(), value);
    }
}
