use crate::openai::chat_completions;
use paperpipe_core::{ApiCredentials, ChatMessage, ChatProvider, Result};

fn endpoint_chat_completions() -> String {
    // Docs: https://docs.perplexity.ai/api-reference/chat-completions-post
    //
    // Allow override for testing/debugging (do not include secrets here).
    std::env::var("PAPERPIPE_PERPLEXITY_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "https://api.perplexity.ai/chat/completions".to_string())
}

/// Perplexity chat-completions adapter. The endpoint is wire-compatible with
/// the OpenAI schema, so the round trip is shared with [`crate::openai`].
#[derive(Debug, Clone)]
pub struct PerplexityClient {
    client: reqwest::Client,
    credentials: ApiCredentials,
    temperature: Option<f64>,
}

impl PerplexityClient {
    pub fn new(client: reqwest::Client, credentials: ApiCredentials) -> Self {
        Self {
            client,
            credentials,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait::async_trait]
impl ChatProvider for PerplexityClient {
    fn name(&self) -> &'static str {
        "perplexity"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        chat_completions(
            &self.client,
            "perplexity",
            &endpoint_chat_completions(),
            &self.credentials,
            self.temperature,
            messages,
        )
        .await
    }
}
