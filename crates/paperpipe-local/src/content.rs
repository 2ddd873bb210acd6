//! Paper content retrieval: ar5iv rendered text, or a PDF reference.
//!
//! The two strategies are mutually exclusive per deployment. Rendered text is
//! fetched and normalized on every request; nothing is cached.

use crate::arxiv::{ar5iv_html_url, arxiv_pdf_url};
use paperpipe_core::{Error, Result};

/// Cap on extracted paper text, to bound downstream token usage.
pub const MAX_PAPER_CHARS: usize = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStrategy {
    /// Fetch the ar5iv HTML rendering and extract readable text.
    #[default]
    RenderedText,
    /// Construct the canonical PDF URL and let the provider read it
    /// server-side. No content is fetched locally.
    PdfReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperContent {
    Text(String),
    PdfUrl(String),
}

impl PaperContent {
    pub fn text(&self) -> Option<&str> {
        match self {
            PaperContent::Text(t) => Some(t),
            PaperContent::PdfUrl(_) => None,
        }
    }
}

/// Retrieve the paper body for one request.
///
/// Non-success HTTP statuses surface as `Error::Fetch` with the status code.
pub async fn fetch_paper_content(
    http: &reqwest::Client,
    strategy: FetchStrategy,
    arxiv_id: &str,
    timeout_ms: u64,
) -> Result<PaperContent> {
    match strategy {
        FetchStrategy::PdfReference => Ok(PaperContent::PdfUrl(arxiv_pdf_url(arxiv_id))),
        FetchStrategy::RenderedText => {
            let url = ar5iv_html_url(arxiv_id);
            let resp = http
                .get(&url)
                .timeout(std::time::Duration::from_millis(timeout_ms.max(1000)))
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(Error::Fetch {
                    status: status.as_u16(),
                });
            }
            let html = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
            let text = extract_readable_text(&html);
            tracing::debug!(arxiv_id, chars = text.chars().count(), "extracted paper text");
            Ok(PaperContent::Text(text))
        }
    }
}

/// Readable text for a rendered paper page: the `#content` container when
/// present (else the document body), with navigation, footers, bibliography,
/// notes, figures and tables stripped, newline runs collapsed, and the result
/// truncated to [`MAX_PAPER_CHARS`].
pub fn extract_readable_text(html: &str) -> String {
    let text = match structured_text(html) {
        Some(t) if has_any_text(&t) => t,
        _ => fallback_text(html),
    };
    truncate_chars(&collapse_newlines(text.trim()), MAX_PAPER_CHARS)
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

// Subtrees that carry no paper content but plenty of tokens.
const STRIPPED_CLASSES: [&str; 4] = ["ltx_bibliography", "ltx_note", "ltx_Figure", "ltx_table"];

fn is_stripped_subtree(el: &html_scraper::ElementRef) -> bool {
    let tag = el.value().name();
    if matches!(tag, "nav" | "footer" | "script" | "style" | "noscript") {
        return true;
    }
    let classes = el.value().attr("class").unwrap_or("");
    classes
        .split_whitespace()
        .any(|c| STRIPPED_CLASSES.contains(&c))
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div" | "section" | "br" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

fn collect_visible_text(el: html_scraper::ElementRef, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = html_scraper::ElementRef::wrap(child) {
            if is_stripped_subtree(&child_el) {
                continue;
            }
            collect_visible_text(child_el, out);
            if is_block_tag(child_el.value().name()) {
                out.push('\n');
            }
        }
    }
}

fn structured_text(html: &str) -> Option<String> {
    let doc = html_scraper::Html::parse_document(html);
    let content_sel = html_scraper::Selector::parse("#content").ok()?;
    let body_sel = html_scraper::Selector::parse("body").ok()?;
    let root = doc
        .select(&content_sel)
        .next()
        .or_else(|| doc.select(&body_sel).next())?;
    let mut out = String::new();
    collect_visible_text(root, &mut out);
    Some(out)
}

/// String-based fallback used when the structured pass yields nothing:
/// isolate the `#content` div when present, drop script/style blocks, turn
/// block boundaries into newlines, then strip remaining tags.
fn fallback_text(html: &str) -> String {
    let scoped = isolate_content_div(html).unwrap_or_else(|| html.to_string());
    let s = strip_tag_blocks(&scoped, "script");
    let s = strip_tag_blocks(&s, "style");
    strip_tags_to_text(&s)
}

fn isolate_content_div(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let mut i = 0usize;
    let body_start = loop {
        let at = i + lower[i..].find("<div")?;
        let gt = at + lower[at..].find('>')?;
        let attrs = &lower[at..gt];
        if attrs.contains("id=\"content\"") || attrs.contains("id='content'") {
            break gt + 1;
        }
        i = gt + 1;
    };

    // Track nesting so the slice spans the whole container, not just up to
    // the first nested close tag.
    let mut depth = 1usize;
    let mut j = body_start;
    loop {
        let open = lower[j..].find("<div");
        let close = lower[j..].find("</div");
        match (open, close) {
            (_, None) => return None,
            (Some(o), Some(c)) if o < c => {
                depth += 1;
                j += o + "<div".len();
            }
            (_, Some(c)) => {
                let at = j + c;
                depth -= 1;
                if depth == 0 {
                    return Some(html[body_start..at].to_string());
                }
                j = at + "</div".len();
            }
        }
    }
}

fn strip_tag_blocks(html: &str, tag: &str) -> String {
    // Minimal, best-effort stripper for <tag ...> ... </tag> blocks. Only
    // removes when a close tag exists; ASCII-case-insensitive on tag names.
    let tag_lc = tag.to_ascii_lowercase();
    let open_pat = format!("<{}", tag_lc);
    let close_pat = format!("</{}>", tag_lc);

    let mut out = String::new();
    let mut i = 0usize;
    let lower = html.to_ascii_lowercase();
    while let Some(rel_start) = lower[i..].find(&open_pat) {
        let start = i + rel_start;
        let after_open = start + open_pat.len();
        if let Some(rel_end) = lower[after_open..].find(&close_pat) {
            let end = after_open + rel_end + close_pat.len();
            out.push_str(&html[i..start]);
            i = end;
        } else {
            break;
        }
    }
    out.push_str(&html[i..]);
    out
}

fn strip_tags_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let Some(gt_rel) = rest[lt..].find('>') else {
            // Unterminated tag; keep the remainder as-is.
            out.push_str(&rest[lt..]);
            return out;
        };
        let tag = &rest[lt + 1..lt + gt_rel];
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if tag.starts_with('/') && is_block_tag(&name) {
            out.push('\n');
        } else if name == "li" {
            out.push_str("- ");
        }
        rest = &rest[lt + gt_rel + 1..];
    }
    out.push_str(rest);
    out
}

/// Collapse runs of 3+ newlines to exactly 2.
fn collapse_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = 0usize;
    for ch in s.chars() {
        if ch == '\n' {
            run += 1;
            if run <= 2 {
                out.push(ch);
            }
        } else {
            run = 0;
            out.push(ch);
        }
    }
    out
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for (n, ch) in s.chars().enumerate() {
        if n >= max_chars {
            break;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <nav><a href="/">ar5iv</a></nav>
  <div id="content">
    <h1>Paper Title</h1>
    <p>First paragraph of the paper.</p>
    <div class="ltx_note">Margin note to drop.</div>
    <p>Second paragraph.</p>
    <figure class="ltx_Figure"><figcaption>Figure 1</figcaption></figure>
    <table class="ltx_table"><tr><td>cell</td></tr></table>
    <section class="ltx_bibliography"><p>[1] Someone, 1999.</p></section>
  </div>
  <footer>arXiv mirror footer</footer>
</body></html>
"#;

    #[test]
    fn structured_extraction_keeps_content_and_drops_boilerplate() {
        let out = extract_readable_text(PAGE);
        assert!(out.contains("Paper Title"));
        assert!(out.contains("First paragraph"));
        assert!(out.contains("Second paragraph"));
        assert!(!out.contains("Margin note"));
        assert!(!out.contains("Figure 1"));
        assert!(!out.contains("cell"));
        assert!(!out.contains("Someone, 1999"));
        assert!(!out.contains("mirror footer"));
        assert!(!out.contains("ar5iv</a>") && !out.contains("<p>"));
    }

    #[test]
    fn body_is_used_when_no_content_container_exists() {
        let out = extract_readable_text("<html><body><p>hello world</p></body></html>");
        assert!(out.contains("hello world"));
    }

    #[test]
    fn newline_runs_collapse_to_two() {
        let out = collapse_newlines("a\n\n\n\n\nb\n\nc");
        assert_eq!(out, "a\n\nb\n\nc");
    }

    #[test]
    fn extraction_truncates_long_pages() {
        let body = "x".repeat(MAX_PAPER_CHARS * 2);
        let html = format!("<html><body><p>{body}</p></body></html>");
        let out = extract_readable_text(&html);
        assert_eq!(out.chars().count(), MAX_PAPER_CHARS);
    }

    #[test]
    fn fallback_converts_blocks_and_list_items() {
        let html = "<div><p>one</p><li>item</li><h2>head</h2></div>";
        let out = strip_tags_to_text(html);
        assert_eq!(out, "one\n- item\nhead\n\n");
    }

    #[test]
    fn fallback_isolates_the_content_div() {
        let html = r#"<html><body>outer
<div id="content"><div class="inner"><p>kept</p></div></div>
<p>dropped</p></body></html>"#;
        let scoped = isolate_content_div(html).unwrap();
        assert!(scoped.contains("kept"));
        assert!(!scoped.contains("dropped"));
        assert!(!scoped.contains("outer"));
    }

    #[test]
    fn strip_tag_blocks_removes_script_and_style() {
        let html = "<p>a</p><script>var x = 1;</script><style>p{}</style><p>b</p>";
        let s = strip_tag_blocks(html, "script");
        let s = strip_tag_blocks(&s, "style");
        assert!(!s.contains("var x"));
        assert!(!s.contains("p{}"));
        assert!(s.contains("<p>a</p>"));
    }

    #[test]
    fn pdf_reference_strategy_builds_a_url_without_io() {
        // No server behind this client; PdfReference must not touch it.
        let http = reqwest::Client::new();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let got = rt
            .block_on(fetch_paper_content(
                &http,
                FetchStrategy::PdfReference,
                "2301.12345",
                1000,
            ))
            .unwrap();
        assert_eq!(
            got,
            PaperContent::PdfUrl("https://arxiv.org/pdf/2301.12345.pdf".to_string())
        );
    }
}
