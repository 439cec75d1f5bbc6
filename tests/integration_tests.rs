use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;

use bookbot::config::AppConfig;
use bookbot::db::{self, queries};
use bookbot::handlers;
use bookbot::models::AppointmentStatus;
use bookbot::services::ai::TextOracle;
use bookbot::services::booking::BookingPolicy;
use bookbot::services::messaging::MessagingProvider;
use bookbot::services::session::InMemorySessions;
use bookbot::state::AppState;

// ── Mock Providers ──

/// Scripted oracle: each `ask` pops the next canned response. An
/// empty script is an oracle failure, which the pipeline must absorb.
struct MockOracle {
    responses: Mutex<VecDeque<String>>,
}

impl MockOracle {
    fn scripted(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl TextOracle for MockOracle {
    async fn ask(
        &self,
        _system_prompt: &str,
        _context: &serde_json::Value,
        _user_text: &str,
    ) -> anyhow::Result<String> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("oracle unavailable"))
    }
}

struct MockMessaging {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl MessagingProvider for MockMessaging {
    async fn send_message(&self, chat_id: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), body.to_string()));
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        telegram_bot_token: "test-bot-token".to_string(),
        webhook_secret: "test-secret".to_string(),
        llm_provider: "ollama".to_string(),
        ollama_url: "http://localhost:11434".to_string(),
        ollama_model: "llama3".to_string(),
        groq_api_key: "".to_string(),
        groq_model: "".to_string(),
        business_open: "09:00".to_string(),
        business_close: "17:00".to_string(),
        business_days: "mon,tue,wed,thu,fri".to_string(),
        slot_minutes: 30,
        enforce_business_hours: false,
        confidence_threshold: 0.4,
        oracle_timeout_secs: 60,
    }
}

fn test_state(responses: &[&str]) -> (Arc<AppState>, Arc<Mutex<Vec<(String, String)>>>) {
    let config = test_config();
    let conn = db::init_db(":memory:").unwrap();
    let policy = BookingPolicy::from_config(&config).unwrap();
    let sent = Arc::new(Mutex::new(vec![]));
    let messaging = MockMessaging {
        sent: Arc::clone(&sent),
    };
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        policy,
        oracle: Box::new(MockOracle::scripted(responses)),
        messaging: Box::new(messaging),
        sessions: Box::new(InMemorySessions::new()),
    });
    (state, sent)
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/telegram", post(handlers::webhook::telegram_webhook))
        .with_state(state)
}

fn telegram_update(chat_id: i64, text: Option<&str>) -> serde_json::Value {
    let mut message = serde_json::json!({
        "message_id": 1,
        "from": {
            "id": chat_id,
            "first_name": "Test",
            "username": "tester",
        },
        "chat": { "id": chat_id },
    });
    if let Some(t) = text {
        message["text"] = serde_json::json!(t);
    }
    serde_json::json!({ "update_id": 1, "message": message })
}

fn telegram_request(chat_id: i64, text: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header("Content-Type", "application/json")
        .header("X-Telegram-Bot-Api-Secret-Token", "test-secret")
        .body(Body::from(telegram_update(chat_id, Some(text)).to_string()))
        .unwrap()
}

async fn send_text(state: &Arc<AppState>, chat_id: i64, text: &str) {
    let res = test_app(state.clone())
        .oneshot(telegram_request(chat_id, text))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

fn last_reply(sent: &Arc<Mutex<Vec<(String, String)>>>) -> String {
    sent.lock().unwrap().last().cloned().expect("no reply sent").1
}

fn book_json(date: &str, time: &str) -> String {
    format!(
        r#"{{"intent":"book_appointment","confidence":0.95,"entities":{{"date":"{date}","time":"{time}","service_type":null,"appointment_id":null}},"missing_info":[],"user_message":"Booking your appointment now.","action":"proceed","metadata":{{}}}}"#
    )
}

// ── Webhook authentication ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state(&[]);
    let res = test_app(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_rejects_missing_secret() {
    let (state, sent) = test_state(&[]);
    let req = Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header("Content-Type", "application/json")
        .body(Body::from(telegram_update(100, Some("hi")).to_string()))
        .unwrap();

    let res = test_app(state).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_rejects_wrong_secret() {
    let (state, _) = test_state(&[]);
    let req = Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header("Content-Type", "application/json")
        .header("X-Telegram-Bot-Api-Secret-Token", "wrong")
        .body(Body::from(telegram_update(100, Some("hi")).to_string()))
        .unwrap();

    let res = test_app(state).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

// ── Commands ──

#[tokio::test]
async fn test_start_registers_customer_and_greets() {
    let (state, sent) = test_state(&[]);
    send_text(&state, 100, "/start").await;

    let reply = last_reply(&sent);
    assert!(reply.contains("Welcome, Test"));

    let db = state.db.lock().unwrap();
    let customer = queries::get_customer_by_chat_id(&db, "100").unwrap();
    assert!(customer.is_some());
}

#[tokio::test]
async fn test_unknown_command() {
    let (state, sent) = test_state(&[]);
    send_text(&state, 100, "/frobnicate").await;
    assert!(last_reply(&sent).contains("/help"));
}

#[tokio::test]
async fn test_media_message_gets_notice() {
    let (state, sent) = test_state(&[]);
    let req = Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header("Content-Type", "application/json")
        .header("X-Telegram-Bot-Api-Secret-Token", "test-secret")
        .body(Body::from(telegram_update(100, None).to_string()))
        .unwrap();

    let res = test_app(state).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(last_reply(&sent).contains("text messages"));
}

// ── Conversation turns ──

#[tokio::test]
async fn test_book_creates_pending_appointment() {
    let (state, sent) = test_state(&[&book_json("2030-06-17", "14:00")]);
    send_text(&state, 100, "Book me in for June 17 at 2pm").await;

    let reply = last_reply(&sent);
    assert!(reply.contains("booked"));
    assert!(reply.contains("#1"));

    let db = state.db.lock().unwrap();
    let appointment = queries::get_appointment(&db, 1).unwrap().unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.time.format("%H:%M").to_string(), "14:00");
}

#[tokio::test]
async fn test_malformed_oracle_output_falls_back() {
    let (state, sent) = test_state(&["Sure, I think you want to book something!"]);
    send_text(&state, 100, "book me something").await;

    assert!(last_reply(&sent).contains("rephrase"));
    let db = state.db.lock().unwrap();
    assert!(queries::get_appointment(&db, 1).unwrap().is_none());
}

#[tokio::test]
async fn test_oracle_failure_sends_retry_apology() {
    // Empty script: every ask errors.
    let (state, sent) = test_state(&[]);
    send_text(&state, 100, "hello?").await;
    assert!(last_reply(&sent).contains("try again"));

    // Nothing was persisted for the failed turn.
    let db = state.db.lock().unwrap();
    let count: i64 = db
        .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_book_missing_time_asks_for_it() {
    let partial = r#"{"intent":"book_appointment","confidence":0.9,"entities":{"date":"2030-06-17","time":null,"service_type":null,"appointment_id":null},"missing_info":["time"],"user_message":"What time works for you?","action":"ask_clarification","metadata":{}}"#;
    let (state, sent) = test_state(&[partial]);
    send_text(&state, 100, "Book me in for June 17").await;

    let reply = last_reply(&sent);
    assert!(reply.contains("time"));

    let db = state.db.lock().unwrap();
    assert!(queries::get_appointment(&db, 1).unwrap().is_none());
}

#[tokio::test]
async fn test_double_booking_same_slot_is_refused() {
    let script = [
        book_json("2030-06-17", "14:00"),
        book_json("2030-06-17", "14:00"),
    ];
    let (state, sent) = test_state(&[&script[0], &script[1]]);

    send_text(&state, 100, "Book June 17 at 2pm").await;
    send_text(&state, 200, "Book June 17 at 2pm").await;

    let reply = last_reply(&sent);
    assert!(reply.contains("not available"));

    let db = state.db.lock().unwrap();
    assert!(queries::get_appointment(&db, 1).unwrap().is_some());
    assert!(queries::get_appointment(&db, 2).unwrap().is_none());
}

#[tokio::test]
async fn test_availability_excludes_booked_slot() {
    let check = r#"{"intent":"check_availability","confidence":0.9,"entities":{"date":"2030-06-17","time":null,"service_type":null,"appointment_id":null},"missing_info":[],"user_message":null,"action":"proceed","metadata":{}}"#;
    let book = book_json("2030-06-17", "09:00");
    let (state, sent) = test_state(&[&book, check]);

    send_text(&state, 100, "Book June 17 at 9am").await;
    send_text(&state, 100, "What's free on June 17?").await;

    let reply = last_reply(&sent);
    assert!(reply.contains("Available times"));
    assert!(!reply.contains("09:00"));
    assert!(reply.contains("09:30"));
}

#[tokio::test]
async fn test_cancel_selection_flow() {
    let cancel_no_id = r#"{"intent":"cancel_appointment","confidence":0.9,"entities":{"date":null,"time":null,"service_type":null,"appointment_id":null},"missing_info":["appointment_id"],"user_message":null,"action":"ask_clarification","metadata":{}}"#;
    let cancel_with_id = r#"{"intent":"cancel_appointment","confidence":0.9,"entities":{"date":null,"time":null,"service_type":null,"appointment_id":1},"missing_info":[],"user_message":null,"action":"proceed","metadata":{}}"#;
    let book = book_json("2030-06-17", "14:00");
    let (state, sent) = test_state(&[&book, cancel_no_id, cancel_with_id]);

    send_text(&state, 100, "Book June 17 at 2pm").await;

    send_text(&state, 100, "Cancel my appointment").await;
    let listing = last_reply(&sent);
    assert!(listing.contains("Which appointment"));
    assert!(listing.contains("#1"));

    send_text(&state, 100, "#1").await;
    assert!(last_reply(&sent).contains("cancelled"));

    let db = state.db.lock().unwrap();
    let appointment = queries::get_appointment(&db, 1).unwrap().unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_foreign_appointment_is_refused() {
    let steal = r#"{"intent":"cancel_appointment","confidence":0.9,"entities":{"date":null,"time":null,"service_type":null,"appointment_id":1},"missing_info":[],"user_message":null,"action":"proceed","metadata":{}}"#;
    let book = book_json("2030-06-17", "14:00");
    let (state, sent) = test_state(&[&book, steal]);

    send_text(&state, 100, "Book June 17 at 2pm").await;
    send_text(&state, 200, "/start").await;
    send_text(&state, 200, "Cancel appointment #1").await;

    assert!(last_reply(&sent).contains("doesn't belong to you"));

    let db = state.db.lock().unwrap();
    let appointment = queries::get_appointment(&db, 1).unwrap().unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn test_myappointments_lists_bookings() {
    let book = book_json("2030-06-17", "14:00");
    let (state, sent) = test_state(&[&book]);

    send_text(&state, 100, "Book June 17 at 2pm").await;
    send_text(&state, 100, "/myappointments").await;

    let reply = last_reply(&sent);
    assert!(reply.contains("#1"));
    assert!(reply.contains("pending"));
}

#[tokio::test]
async fn test_myappointments_empty() {
    let (state, sent) = test_state(&[]);
    send_text(&state, 100, "/myappointments").await;
    assert!(last_reply(&sent).contains("don't have any"));
}

#[tokio::test]
async fn test_smalltalk_relays_oracle_message() {
    let hello = r#"{"intent":"smalltalk","confidence":0.9,"entities":{"date":null,"time":null,"service_type":null,"appointment_id":null},"missing_info":[],"user_message":"Hi! Want to book an appointment?","action":"provide_info","metadata":{}}"#;
    let (state, sent) = test_state(&[hello]);
    send_text(&state, 100, "hey there").await;
    assert_eq!(last_reply(&sent), "Hi! Want to book an appointment?");
}

#[tokio::test]
async fn test_cancel_command_resets_conversation() {
    let reschedule_no_id = r#"{"intent":"reschedule_appointment","confidence":0.9,"entities":{"date":null,"time":null,"service_type":null,"appointment_id":null},"missing_info":["appointment_id"],"user_message":null,"action":"ask_clarification","metadata":{}}"#;
    let book = book_json("2030-06-17", "14:00");
    let (state, sent) = test_state(&[&book, reschedule_no_id]);

    send_text(&state, 100, "Book June 17 at 2pm").await;
    send_text(&state, 100, "Reschedule my appointment").await;
    assert!(last_reply(&sent).contains("Which appointment"));

    send_text(&state, 100, "/cancel").await;
    assert!(last_reply(&sent).contains("cancelled the current operation"));

    let session = state.sessions.get_or_create("100").await;
    let session = session.lock().await;
    assert!(session.pending_action.is_none());
}

#[tokio::test]
async fn test_turns_are_logged() {
    let book = book_json("2030-06-17", "14:00");
    let (state, _) = test_state(&[&book]);
    send_text(&state, 100, "Book June 17 at 2pm").await;

    let db = state.db.lock().unwrap();
    let count: i64 = db
        .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}
