use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Mapping between an external chat identity and our own record.
/// Created lazily on the first interaction that needs one, never
/// deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub chat_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Sender identity as it arrives on the webhook, before any customer
/// record exists.
#[derive(Debug, Clone)]
pub struct ChatIdentity {
    pub chat_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
