use anyhow::Context;
use async_trait::async_trait;

use super::MessagingProvider;

pub struct TelegramProvider {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramProvider {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MessagingProvider for TelegramProvider {
    async fn send_message(&self, chat_id: &str, body: &str) -> anyhow::Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        self.client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": body,
            }))
            .send()
            .await
            .context("failed to send Telegram message")?
            .error_for_status()
            .context("Telegram API returned error")?;

        Ok(())
    }
}
