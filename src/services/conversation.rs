use std::sync::Arc;

use anyhow::Context;
use chrono::Local;

use crate::db::queries;
use crate::models::{ChatIdentity, ConversationState};
use crate::services::ai::intent;
use crate::services::booking;
use crate::state::AppState;

/// Runs one full turn: oracle → normalized intent → state machine →
/// reply text. The per-chat session lock is held throughout, so a
/// user's turns are strictly serialized even when updates arrive
/// back to back.
pub async fn process_turn(
    state: &Arc<AppState>,
    sender: &ChatIdentity,
    text: &str,
) -> anyhow::Result<String> {
    let session = state.sessions.get_or_create(&sender.chat_id).await;
    let mut session = session.lock().await;

    // An unreachable oracle fails the whole turn before anything is
    // mutated; the caller sends the retry apology.
    let context = oracle_context(state, &session, sender);
    let raw = state
        .oracle
        .ask(intent::SYSTEM_PROMPT, &context, text)
        .await
        .context("oracle request failed")?;
    let intent = intent::normalize(&raw);

    tracing::info!(
        chat_id = %sender.chat_id,
        kind = intent.kind.as_str(),
        confidence = intent.confidence,
        "processing turn"
    );

    let now = Local::now().naive_local();
    let reply = {
        let mut db = state.db.lock().unwrap();

        if let Err(e) = queries::record_message(&db, session.customer_id, "user", text, None) {
            tracing::warn!(error = %e, "failed to log user message");
        }

        let reply =
            booking::handle_intent(&mut db, &state.policy, sender, &mut session, &intent, now)?;

        let metadata = serde_json::json!({
            "intent": intent.kind.as_str(),
            "confidence": intent.confidence,
        });
        if let Err(e) = queries::record_message(
            &db,
            session.customer_id,
            "assistant",
            &reply.text,
            Some(&metadata),
        ) {
            tracing::warn!(error = %e, "failed to log assistant message");
        }

        reply
    };

    session.push_turn("user", text);
    session.push_turn("assistant", &reply.text);

    Ok(reply.text)
}

/// Snapshot of the session that accompanies every oracle request.
/// The oracle sees recent turns and the in-flight action so it can
/// resolve references like "the second one" or "make it 3pm".
fn oracle_context(
    state: &AppState,
    session: &ConversationState,
    sender: &ChatIdentity,
) -> serde_json::Value {
    let hours = &state.policy.hours;
    serde_json::json!({
        "current_datetime": Local::now().naive_local().format("%Y-%m-%d %H:%M").to_string(),
        "chat_id": sender.chat_id,
        "customer_known": session.customer_id.is_some(),
        "business_hours": format!(
            "{} to {} on {}",
            hours.open.format("%H:%M"),
            hours.close.format("%H:%M"),
            hours.describe_days(),
        ),
        "history": session.history,
        "pending_action": session.pending_action,
        "last_intent": session.last_intent,
    })
}
