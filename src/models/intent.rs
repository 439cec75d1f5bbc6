use serde::{Deserialize, Serialize};

/// The five intent kinds the booking pipeline understands. Anything
/// else coming back from the oracle is coerced to `Smalltalk` by the
/// normalizer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    BookAppointment,
    CheckAvailability,
    RescheduleAppointment,
    CancelAppointment,
    Smalltalk,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::BookAppointment => "book_appointment",
            IntentKind::CheckAvailability => "check_availability",
            IntentKind::RescheduleAppointment => "reschedule_appointment",
            IntentKind::CancelAppointment => "cancel_appointment",
            IntentKind::Smalltalk => "smalltalk",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "book_appointment" => Some(IntentKind::BookAppointment),
            "check_availability" => Some(IntentKind::CheckAvailability),
            "reschedule_appointment" => Some(IntentKind::RescheduleAppointment),
            "cancel_appointment" => Some(IntentKind::CancelAppointment),
            "smalltalk" => Some(IntentKind::Smalltalk),
            _ => None,
        }
    }
}

/// Advisory hint from the oracle. The state machine may override it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentAction {
    Proceed,
    AskClarification,
    ProvideInfo,
}

impl IntentAction {
    pub fn parse(s: &str) -> Self {
        match s {
            "ask_clarification" => IntentAction::AskClarification,
            "provide_info" => IntentAction::ProvideInfo,
            _ => IntentAction::Proceed,
        }
    }
}

/// Normalized interpretation of a single user utterance. Built fresh
/// per inbound message from raw oracle output, consumed immediately by
/// the booking state machine, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub confidence: f64,
    pub requested_date: Option<String>,
    pub requested_time: Option<String>,
    pub appointment_id: Option<i64>,
    pub service_type: Option<String>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub user_message: Option<String>,
    pub action: IntentAction,
    pub missing_info: Vec<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Intent {
    /// Canonical fallback when the oracle output is unusable.
    pub fn fallback() -> Self {
        Intent {
            kind: IntentKind::Smalltalk,
            confidence: 0.3,
            requested_date: None,
            requested_time: None,
            appointment_id: None,
            service_type: None,
            customer_name: None,
            notes: None,
            user_message: Some(
                "I'm sorry, I didn't understand that. Could you rephrase?".to_string(),
            ),
            action: IntentAction::AskClarification,
            missing_info: vec![],
            metadata: serde_json::Map::new(),
        }
    }
}
