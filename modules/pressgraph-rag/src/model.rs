use async_trait::async_trait;

use ai_client::OpenAi;

/// A chat model that turns a system + user prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl LanguageModel for OpenAi {
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
        Ok(self.chat_completion(system, user).await?)
    }
}
