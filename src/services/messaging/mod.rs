pub mod telegram;

use async_trait::async_trait;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, chat_id: &str, body: &str) -> anyhow::Result<()>;
}
