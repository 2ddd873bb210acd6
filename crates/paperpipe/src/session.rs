//! The background session: a long-lived actor owning the last summary, the
//! last source URL, and the live conversation.
//!
//! All mutation happens on the actor task, so one summarization is in flight
//! at a time and writes never interleave. UIs talk to it over a typed
//! command channel and receive push updates over a broadcast channel.

use paperpipe_core::{ChatMessage, Conversation, Error, Result};
use paperpipe_local::arxiv::arxiv_id_from_url;
use paperpipe_local::summarize::{
    continue_conversation, start_summary_conversation, PipelineOptions,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

pub const NOT_ARXIV_MESSAGE: &str = "This doesn't look like an arXiv paper page.";
pub const WORKING_MESSAGE: &str = "Working: summarizing the paper.";
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug)]
pub enum Command {
    /// Start summarizing `url`. Acknowledged immediately; the result arrives
    /// as a broadcast update.
    Summarize {
        url: String,
        respond: oneshot::Sender<()>,
    },
    GetLastSummary {
        respond: oneshot::Sender<SummarySnapshot>,
    },
    GetConversation {
        respond: oneshot::Sender<ConversationSnapshot>,
    },
    /// Append a follow-up turn to the live conversation, lazily starting one
    /// from `url` when none exists. Acknowledged after the reply lands.
    FollowUp {
        url: String,
        content: String,
        respond: oneshot::Sender<std::result::Result<(), String>>,
    },
    /// One-shot question; answered directly, session state untouched.
    Ask {
        url: String,
        question: String,
        respond: oneshot::Sender<std::result::Result<String, String>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarySnapshot {
    pub summary: Option<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub messages: Vec<ChatMessage>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Update {
    SummaryReady {
        summary: String,
        source_url: Option<String>,
    },
    ConversationUpdated {
        messages: Vec<ChatMessage>,
        source_url: Option<String>,
    },
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    updates: broadcast::Sender<Update>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.updates.subscribe()
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|e| Error::Relay(e.to_string()))
    }

    pub async fn summarize(&self, url: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Summarize {
            url: url.to_string(),
            respond: tx,
        })
        .await?;
        rx.await.map_err(|e| Error::Relay(e.to_string()))
    }

    pub async fn get_last_summary(&self) -> Result<SummarySnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::GetLastSummary { respond: tx }).await?;
        rx.await.map_err(|e| Error::Relay(e.to_string()))
    }

    pub async fn get_conversation(&self) -> Result<ConversationSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::GetConversation { respond: tx }).await?;
        rx.await.map_err(|e| Error::Relay(e.to_string()))
    }

    pub async fn follow_up(
        &self,
        url: &str,
        content: &str,
    ) -> Result<std::result::Result<(), String>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::FollowUp {
            url: url.to_string(),
            content: content.to_string(),
            respond: tx,
        })
        .await?;
        rx.await.map_err(|e| Error::Relay(e.to_string()))
    }

    pub async fn ask(
        &self,
        url: &str,
        question: &str,
    ) -> Result<std::result::Result<String, String>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Ask {
            url: url.to_string(),
            question: question.to_string(),
            respond: tx,
        })
        .await?;
        rx.await.map_err(|e| Error::Relay(e.to_string()))
    }
}

#[derive(Default)]
struct SessionState {
    last_summary: Option<String>,
    last_source_url: Option<String>,
    conversation: Option<Conversation>,
}

pub fn spawn(http: reqwest::Client, opts: PipelineOptions) -> SessionHandle {
    let (tx, rx) = mpsc::channel(16);
    let (updates, _) = broadcast::channel(16);
    tokio::spawn(run(http, opts, rx, updates.clone()));
    SessionHandle { tx, updates }
}

async fn run(
    http: reqwest::Client,
    opts: PipelineOptions,
    mut rx: mpsc::Receiver<Command>,
    updates: broadcast::Sender<Update>,
) {
    let mut state = SessionState::default();
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Summarize { url, respond } => {
                let _ = respond.send(());
                handle_summarize(&http, &opts, &mut state, &updates, &url).await;
            }
            Command::GetLastSummary { respond } => {
                let _ = respond.send(SummarySnapshot {
                    summary: state.last_summary.clone(),
                    source_url: state.last_source_url.clone(),
                });
            }
            Command::GetConversation { respond } => {
                let _ = respond.send(ConversationSnapshot {
                    messages: state
                        .conversation
                        .as_ref()
                        .map(|c| c.messages().to_vec())
                        .unwrap_or_default(),
                    source_url: state.last_source_url.clone(),
                });
            }
            Command::FollowUp {
                url,
                content,
                respond,
            } => {
                let r = handle_follow_up(&http, &opts, &mut state, &updates, &url, &content).await;
                let _ = respond.send(r);
            }
            Command::Ask {
                url,
                question,
                respond,
            } => {
                let r = paperpipe_local::summarize::answer_question(&http, &opts, &url, &question)
                    .await
                    .map_err(|e| e.to_string());
                let _ = respond.send(r);
            }
        }
    }
}

async fn handle_summarize(
    http: &reqwest::Client,
    opts: &PipelineOptions,
    state: &mut SessionState,
    updates: &broadcast::Sender<Update>,
    url: &str,
) {
    if arxiv_id_from_url(url).is_none() {
        state.last_summary = Some(NOT_ARXIV_MESSAGE.to_string());
        state.last_source_url = Some(url.to_string());
        let _ = updates.send(Update::SummaryReady {
            summary: NOT_ARXIV_MESSAGE.to_string(),
            source_url: state.last_source_url.clone(),
        });
        return;
    }

    let _ = updates.send(Update::SummaryReady {
        summary: WORKING_MESSAGE.to_string(),
        source_url: Some(url.to_string()),
    });

    match start_summary_conversation(http, opts, url).await {
        Ok(outcome) => {
            tracing::info!(arxiv_id = %outcome.reference.arxiv_id, "summary ready");
            state.last_summary = Some(outcome.reply);
            state.last_source_url = Some(url.to_string());
            let messages = outcome.conversation.messages().to_vec();
            state.conversation = Some(outcome.conversation);
            let _ = updates.send(Update::ConversationUpdated {
                messages,
                source_url: state.last_source_url.clone(),
            });
        }
        Err(e) => {
            tracing::warn!(error = %e, "summarization failed");
            let msg = format!("{ERROR_PREFIX}{e}");
            state.last_summary = Some(msg.clone());
            let _ = updates.send(Update::SummaryReady {
                summary: msg,
                source_url: Some(url.to_string()),
            });
        }
    }
}

async fn handle_follow_up(
    http: &reqwest::Client,
    opts: &PipelineOptions,
    state: &mut SessionState,
    updates: &broadcast::Sender<Update>,
    url: &str,
    content: &str,
) -> std::result::Result<(), String> {
    if state.conversation.is_none() {
        let outcome = start_summary_conversation(http, opts, url)
            .await
            .map_err(|e| e.to_string())?;
        state.last_summary = Some(outcome.reply);
        state.last_source_url = Some(url.to_string());
        let messages = outcome.conversation.messages().to_vec();
        state.conversation = Some(outcome.conversation);
        let _ = updates.send(Update::ConversationUpdated {
            messages,
            source_url: state.last_source_url.clone(),
        });
    }

    // Take the conversation out while the provider call runs; the user turn
    // stays appended even when the call fails.
    let Some(mut conversation) = state.conversation.take() else {
        return Err("no conversation available".to_string());
    };
    conversation.push_user(content);
    let result = continue_conversation(http, opts, &conversation).await;
    let out = match result {
        Ok(reply) => {
            conversation.push_assistant(&reply);
            state.last_summary = Some(reply);
            let _ = updates.send(Update::ConversationUpdated {
                messages: conversation.messages().to_vec(),
                source_url: state.last_source_url.clone(),
            });
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    };
    state.conversation = Some(conversation);
    out
}
