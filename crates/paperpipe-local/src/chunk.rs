//! Chunk-and-merge summarization for texts beyond the provider window.
//!
//! Windows are measured in characters. Each window is `size` chars, the next
//! starts `overlap` chars before the previous end (clamped to zero), and the
//! last window always ends exactly at the text's end, so the windows cover
//! the source with no gaps.

use crate::content::PaperContent;
use crate::prompt;
use paperpipe_core::{ChatMessage, ChatProvider, Result};

/// Per-call input ceiling; text at or below this goes out in one call.
pub const CHUNK_SIZE_CHARS: usize = 20_000;
/// Overlap carried between consecutive windows.
pub const CHUNK_OVERLAP_CHARS: usize = 1_500;

pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n <= size {
        return vec![text.to_string()];
    }
    // An overlap >= size would stall the window walk.
    let overlap = overlap.min(size.saturating_sub(1));

    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + size).min(n);
        out.push(chars[start..end].iter().collect());
        if end == n {
            break;
        }
        start = end.saturating_sub(overlap);
    }
    out
}

async fn chat_once(provider: &dyn ChatProvider, user_prompt: &str) -> Result<String> {
    provider
        .chat(&[
            ChatMessage::system(prompt::SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
        ])
        .await
}

/// Produce a summary reply for `full_prompt`, chunking when the paper text
/// exceeds [`CHUNK_SIZE_CHARS`].
///
/// The long path is map-then-reduce: one sequential section call per window
/// (source order preserved), partials joined with blank lines, then exactly
/// one merge call. Any failed call fails the whole summarization; there is no
/// retry and no partial result.
pub async fn summarize_with_chunking(
    provider: &dyn ChatProvider,
    paper: &PaperContent,
    paper_url: &str,
    full_prompt: &str,
) -> Result<String> {
    let text = match paper {
        PaperContent::Text(t) => t,
        // PDF-reference deployments never carry local text to split.
        PaperContent::PdfUrl(_) => return chat_once(provider, full_prompt).await,
    };
    if text.chars().count() <= CHUNK_SIZE_CHARS {
        return chat_once(provider, full_prompt).await;
    }

    let pieces = chunk_text(text, CHUNK_SIZE_CHARS, CHUNK_OVERLAP_CHARS);
    tracing::debug!(windows = pieces.len(), "summarizing in chunks");
    let mut partials: Vec<String> = Vec::with_capacity(pieces.len());
    for part in &pieces {
        partials.push(chat_once(provider, &prompt::section_prompt(part, paper_url)).await?);
    }
    chat_once(provider, &prompt::merge_prompt(&partials)).await
}
