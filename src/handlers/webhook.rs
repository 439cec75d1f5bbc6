use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::ChatIdentity;
use crate::services::conversation;
use crate::state::AppState;

#[derive(Deserialize)]
#[allow(dead_code)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

impl TelegramMessage {
    fn sender_identity(&self) -> ChatIdentity {
        ChatIdentity {
            chat_id: self.chat.id.to_string(),
            username: self.from.as_ref().and_then(|u| u.username.clone()),
            first_name: self.from.as_ref().and_then(|u| u.first_name.clone()),
            last_name: self.from.as_ref().and_then(|u| u.last_name.clone()),
        }
    }
}

pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Result<StatusCode, AppError> {
    // Validate the secret token Telegram echoes back on every update
    // (skip if unset — dev mode)
    if !state.config.webhook_secret.is_empty() {
        let token = headers
            .get("x-telegram-bot-api-secret-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if token != state.config.webhook_secret {
            tracing::warn!("invalid webhook secret token");
            return Err(AppError::Unauthorized);
        }
    }

    // Edited messages, channel posts etc. carry no `message`.
    let Some(message) = update.message else {
        return Ok(StatusCode::OK);
    };

    let sender = message.sender_identity();
    let chat_id = sender.chat_id.clone();

    let Some(text) = message
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        let notice =
            "I can only handle text messages right now. Please describe what you'd like to do.";
        if let Err(e) = state.messaging.send_message(&chat_id, notice).await {
            tracing::error!(error = %e, chat_id = %chat_id, "failed to send media notice");
        }
        return Ok(StatusCode::OK);
    };

    tracing::info!(chat_id = %chat_id, text = %text, "incoming message");

    let reply = if text.starts_with('/') {
        handle_command(&state, &sender, text).await
    } else {
        match conversation::process_turn(&state, &sender, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, chat_id = %chat_id, "turn processing failed");
                "Sorry, I'm having trouble right now. Please try again in a moment.".to_string()
            }
        }
    };

    if let Err(e) = state.messaging.send_message(&chat_id, &reply).await {
        tracing::error!(error = %e, chat_id = %chat_id, "failed to send reply");
    }

    Ok(StatusCode::OK)
}

pub async fn handle_command(state: &Arc<AppState>, sender: &ChatIdentity, text: &str) -> String {
    let command = text.split_whitespace().next().unwrap_or("");
    // Group chats append the bot name: "/start@my_bot".
    let command = command.split('@').next().unwrap_or(command);

    match command {
        "/start" => {
            let name = {
                let db = state.db.lock().unwrap();
                match queries::get_or_create_customer(&db, sender) {
                    Ok(customer) => customer.first_name,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to register customer");
                        None
                    }
                }
            };
            let greeting = name.map(|n| format!(", {n}")).unwrap_or_default();
            format!(
                "👋 Welcome{greeting}! I'm your appointment booking assistant.\n\n\
                 You can say things like:\n\
                 • \"Book me an appointment tomorrow at 2pm\"\n\
                 • \"What times are free on Friday?\"\n\
                 • \"Reschedule my appointment\"\n\
                 • \"Cancel my appointment\"\n\n\
                 Type /help to see everything I can do."
            )
        }
        "/help" => "Here's what I can help you with:\n\n\
             📅 Book — \"Book an appointment for December 15 at 2pm\"\n\
             🔍 Check availability — \"What's free next Monday?\"\n\
             🔄 Reschedule — \"Move my appointment to Friday at 10am\"\n\
             ❌ Cancel — \"Cancel appointment #12\"\n\
             📋 /myappointments — list your upcoming appointments\n\
             🚫 /cancel — abandon the current operation\n\n\
             Just tell me what you need in plain language!"
            .to_string(),
        "/myappointments" => {
            let db = state.db.lock().unwrap();
            let appointments = queries::get_customer_by_chat_id(&db, &sender.chat_id)
                .and_then(|customer| match customer {
                    Some(c) => queries::list_active_appointments(&db, c.id),
                    None => Ok(vec![]),
                });
            match appointments {
                Ok(list) if list.is_empty() => {
                    "You don't have any upcoming appointments.".to_string()
                }
                Ok(list) => {
                    let lines = list
                        .iter()
                        .map(|a| format!("• {} ({})", a.summary_line(), a.status.as_str()))
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!("📋 Your upcoming appointments:\n\n{lines}")
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to list appointments");
                    "Sorry, I couldn't look up your appointments right now.".to_string()
                }
            }
        }
        "/cancel" => {
            state.sessions.clear(&sender.chat_id).await;
            "Okay, I've cancelled the current operation. What would you like to do next?"
                .to_string()
        }
        _ => "I don't recognize that command. \
              Try /help, /myappointments, or just tell me what you need."
            .to_string(),
    }
}
