//! ArXiv identifiers: URL parsing, canonical URL construction, and a minimal
//! Atom metadata lookup.
//!
//! Notes:
//! - Modern IDs look like `2301.12345` (optionally `v2`); legacy IDs carry a
//!   category segment (`hep-th/9901001`). Both must survive extraction.
//! - The metadata lookup is best-effort decoration for CLI output; the
//!   summarization path never depends on it.

use paperpipe_core::{Error, Result};

fn arxiv_api_endpoint() -> Result<reqwest::Url> {
    let s = std::env::var("PAPERPIPE_ARXIV_ENDPOINT")
        .ok()
        .unwrap_or_else(|| "https://export.arxiv.org/api/query".to_string());
    reqwest::Url::parse(s.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))
}

fn ar5iv_base() -> String {
    let v = std::env::var("PAPERPIPE_AR5IV_BASE")
        .ok()
        .unwrap_or_else(|| "https://ar5iv.org/html/".to_string());
    let s = v.trim().to_string();
    if s.ends_with('/') {
        s
    } else {
        format!("{s}/")
    }
}

pub fn arxiv_abs_url(id: &str) -> String {
    format!("https://arxiv.org/abs/{}", id.trim())
}

pub fn arxiv_pdf_url(id: &str) -> String {
    format!("https://arxiv.org/pdf/{}.pdf", id.trim())
}

/// URL of the HTML rendering mirror for an ID.
pub fn ar5iv_html_url(id: &str) -> String {
    format!("{}{}", ar5iv_base(), id.trim())
}

fn percent_decode(s: &str) -> String {
    // Paths come back percent-encoded from the URL parser. ArXiv IDs only
    // ever need simple byte escapes (legacy `%2F`), so a small decoder beats
    // pulling in another crate.
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).to_string()
}

fn strip_pdf_suffix(id: &str) -> &str {
    let lower = id.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        &id[..id.len() - 4]
    } else {
        id
    }
}

/// Extract an arXiv ID from a URL, or `None` when the URL doesn't reference
/// an arXiv paper.
///
/// Path shapes `/abs/<id>` and `/pdf/<id>[.pdf]` are handled first; anything
/// else (including unparseable input) falls back to scanning the raw string
/// for `arxiv.org/(abs|pdf)/<id>`, case-insensitively.
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
    if let Ok(u) = url::Url::parse(url.trim()) {
        let path = u.path();
        if let Some(rest) = path.strip_prefix("/abs/") {
            let id = percent_decode(rest.trim_end_matches('/'));
            if !id.is_empty() {
                return Some(id);
            }
        } else if let Some(rest) = path.strip_prefix("/pdf/") {
            let id = percent_decode(strip_pdf_suffix(rest.trim_end_matches('/')));
            if !id.is_empty() {
                return Some(id);
            }
        }
    }
    arxiv_id_from_text(url)
}

fn arxiv_id_from_text(s: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with the original string.
    let lower = s.to_ascii_lowercase();
    let mut from = 0usize;
    while let Some(rel) = lower[from..].find("arxiv.org/") {
        let seg_start = from + rel + "arxiv.org/".len();
        let rest = &lower[seg_start..];
        if !rest.starts_with("abs/") && !rest.starts_with("pdf/") {
            from = seg_start;
            continue;
        }
        let id_start = seg_start + 4;
        let tail = &s[id_start..];
        let end = tail.find(['?', '#']).unwrap_or(tail.len());
        let raw = tail[..end].trim_end_matches('/');
        let id = strip_pdf_suffix(raw).trim_end_matches('/');
        if !id.is_empty() {
            return Some(id.to_string());
        }
        from = id_start;
    }
    None
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ArxivPaper {
    pub arxiv_id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub published: Option<String>,
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn parse_atom(body: &str) -> Vec<ArxivPaper> {
    // quick-xml because Atom namespaces make string matching brittle.
    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    #[derive(Default)]
    struct Cur {
        id_url: String,
        title: String,
        summary: String,
        published: Option<String>,
        authors: Vec<String>,
        in_entry: bool,
        in_author: bool,
        cur_text: String,
    }

    let mut cur = Cur::default();
    let mut papers = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("entry") {
                    cur = Cur::default();
                    cur.in_entry = true;
                }
                if cur.in_entry && name.ends_with("author") {
                    cur.in_author = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) => {
                if cur.in_entry {
                    let txt = t.unescape().map(|t| t.to_string()).unwrap_or_default();
                    cur.cur_text.push_str(&txt);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if cur.in_entry {
                    let txt = normalize_ws(&cur.cur_text);
                    if name.ends_with("id") {
                        cur.id_url = txt;
                    } else if name.ends_with("title") {
                        cur.title = txt;
                    } else if name.ends_with("summary") {
                        cur.summary = txt;
                    } else if name.ends_with("published") {
                        cur.published = (!txt.is_empty()).then_some(txt);
                    } else if cur.in_author && name.ends_with("name") && !txt.is_empty() {
                        cur.authors.push(txt);
                    }
                    cur.cur_text.clear();

                    if name.ends_with("author") {
                        cur.in_author = false;
                    }
                    if name.ends_with("entry") {
                        cur.in_entry = false;
                        let arxiv_id =
                            arxiv_id_from_url(&cur.id_url).unwrap_or_else(|| cur.id_url.clone());
                        papers.push(ArxivPaper {
                            arxiv_id,
                            title: cur.title.clone(),
                            summary: cur.summary.clone(),
                            authors: cur.authors.clone(),
                            published: cur.published.clone(),
                        });
                    }
                }
            }
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    papers
}

/// Look up title/abstract/authors for one ID via the arXiv Atom API.
pub async fn arxiv_lookup_by_id(
    http: &reqwest::Client,
    id: &str,
    timeout_ms: u64,
) -> Result<Option<ArxivPaper>> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::InvalidUrl("id must be non-empty".to_string()));
    }

    let mut url = arxiv_api_endpoint()?;
    url.query_pairs_mut()
        .append_pair("id_list", id)
        .append_pair("max_results", "5");

    let resp = http
        .get(url)
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
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    Ok(parse_atom(&body).into_iter().next())
}
