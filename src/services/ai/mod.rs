pub mod groq;
pub mod intent;
pub mod ollama;

use async_trait::async_trait;

/// Opaque language-model capability: text in, raw string out. The raw
/// string is nominally JSON but the caller must assume nothing; all
/// repair logic lives in [`intent::normalize`].
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn ask(
        &self,
        system_prompt: &str,
        context: &serde_json::Value,
        user_text: &str,
    ) -> anyhow::Result<String>;
}
