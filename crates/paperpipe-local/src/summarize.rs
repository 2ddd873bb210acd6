//! The summarize / follow-up pipeline.
//!
//! One logical flow per request. Credential loading and the content fetch are
//! the only two operations awaited jointly; every provider call after that is
//! strictly sequential.

use crate::arxiv::{arxiv_abs_url, arxiv_id_from_url};
use crate::chunk::summarize_with_chunking;
use crate::content::{fetch_paper_content, FetchStrategy, PaperContent};
use crate::credentials::CredentialSources;
use crate::prompt;
use crate::provider::select_provider;
use paperpipe_core::{ChatProvider, Conversation, Error, PaperReference, Result};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub strategy: FetchStrategy,
    pub fetch_timeout_ms: u64,
    pub temperature: Option<f64>,
    /// Read `.env` / `env.json` credential files. Off for hermetic runs.
    pub use_env_files: bool,
    /// Cap on follow-up turns per conversation. `None` leaves full-history
    /// replay unbounded.
    pub max_turns: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            strategy: FetchStrategy::RenderedText,
            fetch_timeout_ms: 20_000,
            temperature: None,
            use_env_files: true,
            max_turns: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub reference: PaperReference,
    pub conversation: Conversation,
    pub reply: String,
}

fn reference_for(url: &str) -> Result<PaperReference> {
    let arxiv_id = arxiv_id_from_url(url)
        .ok_or_else(|| Error::InvalidUrl(format!("no arXiv ID found in {url}")))?;
    Ok(PaperReference {
        arxiv_id,
        source_url: url.to_string(),
    })
}

async fn gather(
    http: &reqwest::Client,
    opts: &PipelineOptions,
    arxiv_id: &str,
) -> Result<(Box<dyn ChatProvider>, PaperContent)> {
    let (sources, content) = tokio::join!(
        CredentialSources::load_async(opts.use_env_files),
        fetch_paper_content(http, opts.strategy, arxiv_id, opts.fetch_timeout_ms),
    );
    let provider = select_provider(http, &sources, opts.temperature)?;
    Ok((provider, content?))
}

/// Summarize the paper behind `url` and seed a conversation with the
/// exchange: system prompt, initial user prompt, assistant reply.
pub async fn start_summary_conversation(
    http: &reqwest::Client,
    opts: &PipelineOptions,
    url: &str,
) -> Result<SummaryOutcome> {
    let reference = reference_for(url)?;
    tracing::info!(arxiv_id = %reference.arxiv_id, "starting summary");
    let (provider, content) = gather(http, opts, &reference.arxiv_id).await?;

    let abs_url = arxiv_abs_url(&reference.arxiv_id);
    let user_prompt = prompt::summary_prompt(&content, &abs_url);
    let mut conversation = Conversation::start(prompt::SYSTEM_PROMPT, &user_prompt);
    let reply = summarize_with_chunking(provider.as_ref(), &content, &abs_url, &user_prompt).await?;
    conversation.push_assistant(&reply);

    Ok(SummaryOutcome {
        reference,
        conversation,
        reply,
    })
}

/// Replay the full conversation (trailing user turn included) and return the
/// assistant's reply. The provider is stateless between calls, so nothing
/// short of the whole sequence will do.
pub async fn continue_conversation(
    http: &reqwest::Client,
    opts: &PipelineOptions,
    conversation: &Conversation,
) -> Result<String> {
    if let Some(max) = opts.max_turns {
        let follow_ups = conversation.user_turns().saturating_sub(1);
        if follow_ups > max {
            return Err(Error::TurnLimit(max));
        }
    }
    let sources = CredentialSources::load_async(opts.use_env_files).await;
    let provider = select_provider(http, &sources, opts.temperature)?;
    provider.chat(conversation.messages()).await
}

/// One-shot question against freshly fetched paper text. No conversation
/// state is created or touched.
pub async fn answer_question(
    http: &reqwest::Client,
    opts: &PipelineOptions,
    url: &str,
    question: &str,
) -> Result<String> {
    let reference = reference_for(url)?;
    let (provider, content) = gather(http, opts, &reference.arxiv_id).await?;
    let abs_url = arxiv_abs_url(&reference.arxiv_id);
    let user_prompt = prompt::followup_prompt(&content, &abs_url, question);
    summarize_with_chunking(provider.as_ref(), &content, &abs_url, &user_prompt).await
}
