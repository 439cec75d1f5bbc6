use serde_json::Value;

use crate::models::{Intent, IntentAction, IntentKind};

pub const SYSTEM_PROMPT: &str = r##"You are an intelligent appointment booking assistant. Your primary role is to help users book, check, reschedule, or cancel appointments through natural conversation.

## Supported Intents:
- "book_appointment": User wants to create a new appointment
- "check_availability": User wants to see available time slots
- "reschedule_appointment": User wants to change an existing appointment
- "cancel_appointment": User wants to cancel an appointment
- "smalltalk": General conversation, greetings, or off-topic queries

## Date/Time Handling Rules:
- Accept natural language dates ("tomorrow", "next Monday", "December 15th")
- Convert relative dates to absolute dates using the current date in the context
- Output dates as YYYY-MM-DD and times as HH:MM (24-hour)

## Response Format:
You MUST respond with VALID JSON only. No markdown, no explanations outside the JSON.

Required JSON structure:
{
    "intent": "book_appointment|check_availability|reschedule_appointment|cancel_appointment|smalltalk",
    "confidence": 0.0-1.0,
    "entities": {
        "date": "YYYY-MM-DD" or null,
        "time": "HH:MM" or null,
        "service_type": "string or null",
        "appointment_id": "integer or null"
    },
    "missing_info": ["list of missing required fields"],
    "user_message": "natural language response to user",
    "action": "proceed|ask_clarification|provide_info",
    "metadata": {}
}

## Validation Rules:
- If date or time is missing for booking, add it to missing_info
- If the intent is unclear, set confidence below 0.7 and ask a clarifying question
- For cancellation or rescheduling, extract the appointment_id when the user gives one (e.g. "#123")
- NEVER make up information - only extract what the user provides
- Always output valid JSON"##;

/// Ordered-priority alias table: the first path that resolves to a
/// non-null value wins. Kept as data so the merge rule is auditable
/// and testable on its own.
const DATE_ALIASES: &[&[&str]] = &[&["entities", "date"], &["date"], &["requested_date"]];
const TIME_ALIASES: &[&[&str]] = &[&["entities", "time"], &["time"], &["requested_time"]];
const NOTES_ALIASES: &[&[&str]] = &[&["entities", "notes"], &["notes"]];
const APPOINTMENT_ID_ALIASES: &[&[&str]] =
    &[&["entities", "appointment_id"], &["appointment_id"]];
const SERVICE_TYPE_ALIASES: &[&[&str]] = &[&["entities", "service_type"], &["service_type"]];
const CUSTOMER_NAME_ALIASES: &[&[&str]] = &[&["customer_name"], &["name"]];

/// Turns raw oracle output into a well-formed [`Intent`]. Total: any
/// malformed, empty, or non-JSON input yields the canonical fallback
/// smalltalk intent rather than an error.
pub fn normalize(raw: &str) -> Intent {
    let cleaned = strip_code_fences(raw);

    let parsed: Option<Value> = serde_json::from_str(cleaned)
        .ok()
        .or_else(|| extract_json_object(cleaned).and_then(|s| serde_json::from_str(s).ok()));

    let Some(value) = parsed.filter(Value::is_object) else {
        tracing::warn!("oracle output was not a JSON object, using fallback intent");
        return Intent::fallback();
    };

    let kind = match value.get("intent").and_then(Value::as_str) {
        Some(s) => IntentKind::parse(s).unwrap_or_else(|| {
            tracing::warn!(intent = s, "unknown intent kind, treating as smalltalk");
            IntentKind::Smalltalk
        }),
        None => {
            tracing::warn!("oracle output missing intent kind, treating as smalltalk");
            IntentKind::Smalltalk
        }
    };

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);

    let action = value
        .get("action")
        .and_then(Value::as_str)
        .map(IntentAction::parse)
        .unwrap_or(IntentAction::Proceed);

    let missing_info = value
        .get("missing_info")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let metadata = value
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Intent {
        kind,
        confidence,
        requested_date: aliased_string(&value, DATE_ALIASES),
        requested_time: aliased_string(&value, TIME_ALIASES),
        appointment_id: aliased_id(&value, APPOINTMENT_ID_ALIASES),
        service_type: aliased_string(&value, SERVICE_TYPE_ALIASES),
        customer_name: aliased_string(&value, CUSTOMER_NAME_ALIASES),
        notes: aliased_string(&value, NOTES_ALIASES),
        user_message: value
            .get("user_message")
            .and_then(Value::as_str)
            .map(str::to_string),
        action,
        missing_info,
        metadata,
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_prefix
        .strip_suffix("```")
        .unwrap_or(without_prefix)
        .trim()
}

/// Outermost balanced brace-delimited substring, if any. String
/// literals are respected so braces inside values don't confuse the
/// depth count.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn resolve<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn aliased_string(value: &Value, aliases: &[&[&str]]) -> Option<String> {
    aliases
        .iter()
        .find_map(|path| resolve(value, path))
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// Appointment ids arrive as integers, numeric strings, or "#123".
fn aliased_id(value: &Value, aliases: &[&[&str]]) -> Option<i64> {
    let found = aliases.iter().find_map(|path| resolve(value, path))?;
    match found {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_yields_fallback() {
        for raw in ["", "not json at all", "{broken", "[1,2,3]", "null"] {
            let intent = normalize(raw);
            assert_eq!(intent.kind, IntentKind::Smalltalk, "input: {raw:?}");
            assert_eq!(intent.confidence, 0.3);
            assert_eq!(intent.action, IntentAction::AskClarification);
            assert!(intent.user_message.unwrap().contains("rephrase"));
        }
    }

    #[test]
    fn test_valid_kinds_are_preserved() {
        for kind in [
            "book_appointment",
            "check_availability",
            "reschedule_appointment",
            "cancel_appointment",
            "smalltalk",
        ] {
            let raw = format!(r#"{{"intent":"{kind}","confidence":0.9}}"#);
            let intent = normalize(&raw);
            assert_eq!(intent.kind.as_str(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_coerced_to_smalltalk() {
        let intent = normalize(r#"{"intent":"order_pizza","confidence":0.9}"#);
        assert_eq!(intent.kind, IntentKind::Smalltalk);
        // Coercion keeps the rest of the payload intact.
        assert_eq!(intent.confidence, 0.9);
    }

    #[test]
    fn test_confidence_defaults_and_clamps() {
        assert_eq!(normalize(r#"{"intent":"smalltalk"}"#).confidence, 0.5);
        assert_eq!(
            normalize(r#"{"intent":"smalltalk","confidence":"high"}"#).confidence,
            0.5
        );
        assert_eq!(
            normalize(r#"{"intent":"smalltalk","confidence":1.7}"#).confidence,
            1.0
        );
        assert_eq!(
            normalize(r#"{"intent":"smalltalk","confidence":-0.2}"#).confidence,
            0.0
        );
    }

    #[test]
    fn test_code_fences_are_stripped() {
        let raw = "```json\n{\"intent\":\"book_appointment\",\"confidence\":0.8}\n```";
        assert_eq!(normalize(raw).kind, IntentKind::BookAppointment);
    }

    #[test]
    fn test_object_extracted_from_chatty_response() {
        let raw = "Sure! Here is the JSON you asked for:\n{\"intent\":\"cancel_appointment\",\"entities\":{\"appointment_id\":\"#42\"}}\nHope that helps.";
        let intent = normalize(raw);
        assert_eq!(intent.kind, IntentKind::CancelAppointment);
        assert_eq!(intent.appointment_id, Some(42));
    }

    #[test]
    fn test_braces_inside_strings_do_not_break_extraction() {
        let raw = "note: {\"intent\":\"smalltalk\",\"user_message\":\"use {braces} freely\"}";
        let intent = normalize(raw);
        assert_eq!(intent.user_message.as_deref(), Some("use {braces} freely"));
    }

    #[test]
    fn test_date_alias_priority() {
        // entities.date wins over both top-level spellings.
        let raw = r#"{"intent":"book_appointment","entities":{"date":"2030-01-07"},"date":"2030-02-02","requested_date":"2030-03-03"}"#;
        assert_eq!(
            normalize(raw).requested_date.as_deref(),
            Some("2030-01-07")
        );

        // Null entities.date falls through to the next alias.
        let raw = r#"{"intent":"book_appointment","entities":{"date":null},"date":"2030-02-02"}"#;
        assert_eq!(
            normalize(raw).requested_date.as_deref(),
            Some("2030-02-02")
        );

        let raw = r#"{"intent":"book_appointment","requested_date":"2030-03-03"}"#;
        assert_eq!(
            normalize(raw).requested_date.as_deref(),
            Some("2030-03-03")
        );
    }

    #[test]
    fn test_time_alias_priority() {
        let raw = r#"{"intent":"book_appointment","entities":{"time":"14:00"},"time":"15:00"}"#;
        assert_eq!(normalize(raw).requested_time.as_deref(), Some("14:00"));
    }

    #[test]
    fn test_appointment_id_accepts_number_and_string() {
        let raw = r#"{"intent":"cancel_appointment","entities":{"appointment_id":123}}"#;
        assert_eq!(normalize(raw).appointment_id, Some(123));

        let raw = r#"{"intent":"cancel_appointment","appointment_id":"123"}"#;
        assert_eq!(normalize(raw).appointment_id, Some(123));
    }

    #[test]
    fn test_missing_containers_default_empty() {
        let intent = normalize(r#"{"intent":"smalltalk"}"#);
        assert!(intent.missing_info.is_empty());
        assert!(intent.metadata.is_empty());
    }

    #[test]
    fn test_action_defaults_to_proceed() {
        assert_eq!(
            normalize(r#"{"intent":"book_appointment"}"#).action,
            IntentAction::Proceed
        );
        assert_eq!(
            normalize(r#"{"intent":"book_appointment","action":"ask_clarification"}"#).action,
            IntentAction::AskClarification
        );
    }
}
