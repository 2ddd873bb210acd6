use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http transport failed: {0}")]
    Http(String),
    #[error("failed to fetch paper text: HTTP {status}")]
    Fetch { status: u16 },
    #[error("no API key configured: {0}")]
    MissingCredential(String),
    #[error("{provider} chat.completions HTTP {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("model returned an empty reply")]
    EmptyResponse,
    #[error("conversation turn limit reached ({0}); start a new summary")]
    TurnLimit(usize),
    #[error("session relay failed: {0}")]
    Relay(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Message role, serialized in the chat-completions wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only message sequence for one summarization session.
///
/// The provider is stateless between calls, so the full sequence is replayed
/// on every turn. Nothing here truncates or reorders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Seed a conversation with the system prompt and the initial user turn.
    pub fn start(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of user turns issued so far (the initial prompt counts as one).
    pub fn user_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count()
    }

    pub fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

/// A paper located on arXiv. `arxiv_id` is non-empty by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperReference {
    pub arxiv_id: String,
    pub source_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCredentials {
    pub api_key: String,
    pub model: String,
}

/// One chat-completion provider. Implementations return the first choice's
/// reply text, already trimmed and verified non-empty.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_in_wire_form() {
        let m = ChatMessage::system("s");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["role"].as_str(), Some("system"));
        let m = ChatMessage::assistant("a");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["role"].as_str(), Some("assistant"));
    }

    #[test]
    fn conversation_preserves_append_order() {
        let mut c = Conversation::start("sys", "first");
        c.push_assistant("reply one");
        c.push_user("second");
        c.push_assistant("reply two");

        let roles: Vec<Role> = c.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        assert_eq!(c.user_turns(), 2);
        assert_eq!(c.last_assistant(), Some("reply two"));
    }

    #[test]
    fn conversation_serializes_as_a_bare_message_list() {
        let c = Conversation::start("sys", "u");
        let v = serde_json::to_value(&c).unwrap();
        assert!(v.is_array());
        assert_eq!(v.as_array().unwrap().len(), 2);
    }

    #[test]
    fn fetch_error_display_carries_the_status_code() {
        let e = Error::Fetch { status: 503 };
        assert!(e.to_string().contains("503"));
        let e = Error::Api {
            provider: "openai",
            status: 429,
            body: "rate limited".to_string(),
        };
        let s = e.to_string();
        assert!(s.contains("429"));
        assert!(s.contains("rate limited"));
    }
}
