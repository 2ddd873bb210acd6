//! Provider selection: one configuration decision, made before any call.

use crate::credentials::{CredentialSources, ProviderKind};
use crate::openai::OpenAiClient;
use crate::perplexity::PerplexityClient;
use paperpipe_core::{ChatProvider, Error, Result};

/// Pick the provider for this request: Perplexity when its key resolves,
/// else OpenAI. Call sites never branch on the provider again.
pub fn select_provider(
    http: &reqwest::Client,
    sources: &CredentialSources,
    temperature: Option<f64>,
) -> Result<Box<dyn ChatProvider>> {
    if let Some(creds) = sources.resolve(ProviderKind::Perplexity) {
        tracing::debug!(model = %creds.model, "using perplexity");
        return Ok(Box::new(
            PerplexityClient::new(http.clone(), creds).with_temperature(temperature),
        ));
    }
    if let Some(creds) = sources.resolve(ProviderKind::OpenAi) {
        tracing::debug!(model = %creds.model, "using openai");
        return Ok(Box::new(
            OpenAiClient::new(http.clone(), creds).with_temperature(temperature),
        ));
    }
    Err(Error::MissingCredential(
        "no Perplexity or OpenAI API key found; run `paperpipe config set`, or put one in .env or env.json".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Settings;
    use std::collections::BTreeMap;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn perplexity_takes_precedence_when_both_keys_resolve() {
        let sources = CredentialSources::from_parts(
            map(&[
                ("OPENAI_API_KEY", "sk-x"),
                ("PERPLEXITY_API_KEY", "pplx-x"),
            ]),
            BTreeMap::new(),
            Settings::default(),
        );
        let p = select_provider(&reqwest::Client::new(), &sources, None).unwrap();
        assert_eq!(p.name(), "perplexity");
    }

    #[test]
    fn openai_is_the_fallback() {
        let sources = CredentialSources::from_parts(
            map(&[("OPENAI_API_KEY", "sk-x")]),
            BTreeMap::new(),
            Settings::default(),
        );
        let p = select_provider(&reqwest::Client::new(), &sources, None).unwrap();
        assert_eq!(p.name(), "openai");
    }

    #[test]
    fn no_key_is_an_actionable_missing_credential_error() {
        let sources = CredentialSources::default();
        let err = match select_provider(&reqwest::Client::new(), &sources, None) {
            Ok(_) => panic!("expected MissingCredential error, got Ok"),
            Err(e) => e,
        };
        match err {
            Error::MissingCredential(msg) => assert!(msg.contains("paperpipe config")),
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }
}
