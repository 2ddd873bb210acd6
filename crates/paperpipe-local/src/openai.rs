use paperpipe_core::{ApiCredentials, ChatMessage, ChatProvider, Error, Result};
use serde::{Deserialize, Serialize};

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn endpoint_chat_completions() -> String {
    // Override for testing/debugging only (do not include secrets here).
    env("PAPERPIPE_OPENAI_ENDPOINT")
        .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string())
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    credentials: ApiCredentials,
    temperature: Option<f64>,
}

impl OpenAiClient {
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
impl ChatProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        chat_completions(
            &self.client,
            "openai",
            &endpoint_chat_completions(),
            &self.credentials,
            self.temperature,
            messages,
        )
        .await
    }
}

/// One chat-completions round trip, shared by both adapters (the Perplexity
/// endpoint is wire-compatible with the OpenAI schema).
pub(crate) async fn chat_completions(
    client: &reqwest::Client,
    provider: &'static str,
    endpoint: &str,
    credentials: &ApiCredentials,
    temperature: Option<f64>,
    messages: &[ChatMessage],
) -> Result<String> {
    let req = ChatCompletionsRequest {
        model: credentials.model.clone(),
        messages: messages.to_vec(),
        temperature,
    };

    let resp = client
        .post(endpoint)
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Bearer {}", credentials.api_key),
        )
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .json(&req)
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    let parsed: ChatCompletionsResponse =
        resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
    let text = parsed
        .choices
        .first()
        .map(|c| c.message.content.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(Error::EmptyResponse);
    }
    Ok(text)
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}
