//! Prompt templates.
//!
//! Pure string formatting, no IO. Rewording is fine as long as the structural
//! constraints survive: paragraph ceilings (1-3 for summaries, 1-2 for
//! follow-ups), no bullet lists in the output, and the instruction to use
//! only the supplied text and never request more content.

use crate::content::PaperContent;

pub const SYSTEM_PROMPT: &str =
    "You produce rigorous, succinct scientific summaries in clear paragraph form.";

const SELF_CONTAINED: &str = "Use only the provided text; do not ask for more \
content or mention browsing. Assume the reader is well-versed in the field; \
skip basic explanations and definitions.";

pub fn summary_prompt(paper: &PaperContent, paper_url: &str) -> String {
    let lead = "You are a concise scientific paper summarizer. Summarize the \
following arXiv paper into 1-3 tight paragraphs (no bullets), capturing the \
core problem and why it matters, the main contributions (be specific), the \
key methodology, the most important results, and any limitations. Avoid \
fluff; prefer concrete details over generic exposition. Do not include \
citations, section numbers, or quotes.";
    match paper {
        PaperContent::Text(text) => format!(
            "{lead} {SELF_CONTAINED}\n\nPaper URL: {paper_url}\n\n--- BEGIN PAPER TEXT ---\n{text}\n--- END PAPER TEXT ---\n"
        ),
        PaperContent::PdfUrl(pdf_url) => format!(
            "{lead} Read the paper from the PDF at the URL below; do not ask \
for more content.\n\nPaper URL: {paper_url}\nPaper PDF: {pdf_url}\n"
        ),
    }
}

pub fn followup_prompt(paper: &PaperContent, paper_url: &str, question: &str) -> String {
    let lead = "You are answering a technical follow-up question about the \
following arXiv paper. Provide a concise, expert-level answer (1-2 tight \
paragraphs, no bullets) that focuses on concrete details from the text.";
    match paper {
        PaperContent::Text(text) => format!(
            "{lead} {SELF_CONTAINED}\n\nPaper URL: {paper_url}\nUser question: {question}\n\n--- BEGIN PAPER TEXT ---\n{text}\n--- END PAPER TEXT ---\n"
        ),
        PaperContent::PdfUrl(pdf_url) => format!(
            "{lead} Read the paper from the PDF at the URL below; do not ask \
for more content.\n\nPaper URL: {paper_url}\nPaper PDF: {pdf_url}\nUser question: {question}\n"
        ),
    }
}

/// Section-level prompt for one chunk of a long paper.
pub fn section_prompt(part: &str, paper_url: &str) -> String {
    format!(
        "Summarize this section into a concise paragraph that preserves \
concrete details (problem, contributions, methods, results, limitations). \
URL: {paper_url}\n\n--- TEXT ---\n{part}\n--- END ---"
    )
}

/// Merge prompt over all partial summaries, in source order.
pub fn merge_prompt(partials: &[String]) -> String {
    format!(
        "Merge the partial paragraphs into 1-3 cohesive paragraphs covering: \
problem, specific contributions, key methods, important results and any \
limitations. Avoid repetition and fluff.\n\n--- PARTIALS ---\n{}\n--- END ---",
        partials.join("\n\n")
    )
}
