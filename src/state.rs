use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::ai::TextOracle;
use crate::services::booking::BookingPolicy;
use crate::services::messaging::MessagingProvider;
use crate::services::session::SessionStore;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub policy: BookingPolicy,
    pub oracle: Box<dyn TextOracle>,
    pub messaging: Box<dyn MessagingProvider>,
    pub sessions: Box<dyn SessionStore>,
}
