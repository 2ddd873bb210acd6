use paperpipe_core::{Error, Result};
use std::time::Duration;

pub mod arxiv;
pub mod chunk;
pub mod content;
pub mod credentials;
pub mod openai;
pub mod perplexity;
pub mod prompt;
pub mod provider;
pub mod summarize;

/// Shared HTTP client for every outbound call.
///
/// Only a connect timeout is applied here. Content fetches take an explicit
/// per-request timeout; provider calls run on whatever the transport allows,
/// since completions regularly outlast any sensible blanket deadline.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("paperpipe/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::Http(e.to_string()))
}
