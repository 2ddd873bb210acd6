//! Credential resolution: first non-empty source wins, no merging.
//!
//! Precedence (highest first): compiled-in constants, key=value env file,
//! JSON env file, persisted settings store. Key and model always come from
//! the same source; a source that has a key but no model gets the
//! per-provider default model, never a lower-priority source's model.

use paperpipe_core::ApiCredentials;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Compiled-in credentials, the highest-precedence source. Leave empty for
// normal builds; fill in for personal builds only.
const BUILTIN_OPENAI_API_KEY: &str = "";
const BUILTIN_OPENAI_MODEL: &str = "";
const BUILTIN_PERPLEXITY_API_KEY: &str = "";
const BUILTIN_PERPLEXITY_MODEL: &str = "";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5-mini-2025-08-07";
pub const DEFAULT_PERPLEXITY_MODEL: &str = "sonar-pro";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Perplexity,
}

impl ProviderKind {
    pub fn key_name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Perplexity => "PERPLEXITY_API_KEY",
        }
    }

    pub fn model_name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_MODEL",
            ProviderKind::Perplexity => "PERPLEXITY_MODEL",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => DEFAULT_OPENAI_MODEL,
            ProviderKind::Perplexity => DEFAULT_PERPLEXITY_MODEL,
        }
    }

    fn builtin(self) -> (&'static str, &'static str) {
        match self {
            ProviderKind::OpenAi => (BUILTIN_OPENAI_API_KEY, BUILTIN_OPENAI_MODEL),
            ProviderKind::Perplexity => (BUILTIN_PERPLEXITY_API_KEY, BUILTIN_PERPLEXITY_MODEL),
        }
    }
}

/// Persisted per-provider settings (the options-page equivalent), stored as
/// JSON in the user config directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_model: Option<String>,
    #[serde(default)]
    pub perplexity_api_key: Option<String>,
    #[serde(default)]
    pub perplexity_model: Option<String>,
}

impl Settings {
    /// Best-effort load; a missing or unreadable store is an empty one.
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, body)
    }

    fn key_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Perplexity => self.perplexity_api_key.as_deref(),
        }
    }

    fn model_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAi => self.openai_model.as_deref(),
            ProviderKind::Perplexity => self.perplexity_model.as_deref(),
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    let base = std::env::var("PAPERPIPE_CONFIG_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("paperpipe")
        });
    base.join("settings.json")
}

/// Parse a `KEY=value` env file. `#` lines and blanks are ignored; values may
/// be single- or double-quoted.
fn parse_env_file(text: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for raw in text.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        out.insert(k.to_string(), unquote(v.trim()).to_string());
    }
    out
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

fn parse_json_env(text: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Ok(serde_json::Value::Object(obj)) = serde_json::from_str(text) {
        for (k, v) in obj {
            if let serde_json::Value::String(s) = v {
                out.insert(k, s);
            }
        }
    }
    out
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// A snapshot of every credential source, loaded once per request.
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    env_file: BTreeMap<String, String>,
    json_file: BTreeMap<String, String>,
    settings: Settings,
}

impl CredentialSources {
    pub fn load(use_env_files: bool) -> Self {
        let settings = Settings::load(&default_settings_path());
        if !use_env_files {
            return Self {
                settings,
                ..Self::default()
            };
        }
        let env_path = std::env::var("PAPERPIPE_ENV_FILE")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".env"));
        let json_path = std::env::var("PAPERPIPE_ENV_JSON")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("env.json"));
        let env_file = std::fs::read_to_string(&env_path)
            .map(|t| parse_env_file(&t))
            .unwrap_or_default();
        let json_file = std::fs::read_to_string(&json_path)
            .map(|t| parse_json_env(&t))
            .unwrap_or_default();
        Self {
            env_file,
            json_file,
            settings,
        }
    }

    /// Same as [`CredentialSources::load`], off the async runtime's worker
    /// threads (the reads are blocking file IO).
    pub async fn load_async(use_env_files: bool) -> Self {
        tokio::task::spawn_blocking(move || Self::load(use_env_files))
            .await
            .unwrap_or_default()
    }

    pub fn from_parts(
        env_file: BTreeMap<String, String>,
        json_file: BTreeMap<String, String>,
        settings: Settings,
    ) -> Self {
        Self {
            env_file,
            json_file,
            settings,
        }
    }

    /// Resolve `{api_key, model}` for one provider, or `None` when no source
    /// carries a key. The winning source also supplies the model, with the
    /// per-provider default as the in-source fallback.
    pub fn resolve(&self, kind: ProviderKind) -> Option<ApiCredentials> {
        let (builtin_key, builtin_model) = kind.builtin();
        let sources: [(Option<&str>, Option<&str>); 4] = [
            (Some(builtin_key), Some(builtin_model)),
            (
                self.env_file.get(kind.key_name()).map(String::as_str),
                self.env_file.get(kind.model_name()).map(String::as_str),
            ),
            (
                self.json_file.get(kind.key_name()).map(String::as_str),
                self.json_file.get(kind.model_name()).map(String::as_str),
            ),
            (self.settings.key_for(kind), self.settings.model_for(kind)),
        ];
        for (key, model) in sources {
            if let Some(key) = non_empty(key) {
                let model = non_empty(model).unwrap_or(kind.default_model());
                return Some(ApiCredentials {
                    api_key: key.to_string(),
                    model: model.to_string(),
                });
            }
        }
        None
    }
}
