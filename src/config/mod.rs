//! Application configuration

pub mod persona;

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use persona::{Persona, TranslationPrompt};

const DEFAULT_COMPLETION_URL: &str =
    "https://0xe7f3b9d8c714d9063faac1ad6a169043a19810e7.gaia.domains/v1";
const DEFAULT_COMPLETION_MODEL: &str = "Llama-3.2-3B-Instruct";
const DEFAULT_TRANSLATION_URL: &str = "https://korean.gaia.domains/v1";
const DEFAULT_TRANSLATION_MODEL: &str = "llama-3-Korean-Bllossom-8B-gguf-Q4_K_M";

/// One remote chat-completion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub completion: EndpointConfig,
    /// `None` disables translation; completion keeps working
    pub translation: Option<EndpointConfig>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub persona_file: Option<PathBuf>,
    /// Sessions untouched for this long are dropped
    pub session_idle_secs: u64,
    pub max_sessions: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let port = match var("PORT") {
            Some(p) => p.parse().with_context(|| format!("invalid PORT: {}", p))?,
            None => 3000,
        };
        let temperature = match var("TWIN_TEMPERATURE") {
            Some(t) => t
                .parse()
                .with_context(|| format!("invalid TWIN_TEMPERATURE: {}", t))?,
            None => 0.7,
        };
        let max_tokens = match var("TWIN_MAX_TOKENS") {
            Some(t) => t
                .parse()
                .with_context(|| format!("invalid TWIN_MAX_TOKENS: {}", t))?,
            None => 500,
        };
        let request_timeout_secs = match var("TWIN_REQUEST_TIMEOUT_SECS") {
            Some(t) => t
                .parse()
                .with_context(|| format!("invalid TWIN_REQUEST_TIMEOUT_SECS: {}", t))?,
            None => 120,
        };
        let session_idle_secs = match var("TWIN_SESSION_IDLE_SECS") {
            Some(t) => t
                .parse()
                .with_context(|| format!("invalid TWIN_SESSION_IDLE_SECS: {}", t))?,
            None => 3600,
        };
        let max_sessions = match var("TWIN_MAX_SESSIONS") {
            Some(n) => n
                .parse()
                .with_context(|| format!("invalid TWIN_MAX_SESSIONS: {}", n))?,
            None => 1000,
        };

        let completion = EndpointConfig {
            base_url: or("TWIN_COMPLETION_URL", DEFAULT_COMPLETION_URL),
            model: or("TWIN_COMPLETION_MODEL", DEFAULT_COMPLETION_MODEL),
            api_key: var("TWIN_COMPLETION_API_KEY"),
        };

        let translation_enabled = flag(var("TWIN_TRANSLATION_ENABLED"), true)?;
        let require_key = flag(var("TWIN_TRANSLATION_REQUIRE_KEY"), false)?;
        let translation_key = var("TWIN_TRANSLATION_API_KEY");

        let translation = if !translation_enabled {
            None
        } else if require_key && translation_key.is_none() {
            tracing::warn!("TWIN_TRANSLATION_API_KEY is not set, translation disabled");
            None
        } else {
            Some(EndpointConfig {
                base_url: or("TWIN_TRANSLATION_URL", DEFAULT_TRANSLATION_URL),
                model: or("TWIN_TRANSLATION_MODEL", DEFAULT_TRANSLATION_MODEL),
                api_key: translation_key,
            })
        };

        Ok(Self {
            host: or("HOST", "127.0.0.1"),
            port,
            completion,
            translation,
            temperature,
            max_tokens,
            request_timeout_secs,
            persona_file: var("TWIN_PERSONA_FILE").map(PathBuf::from),
            session_idle_secs,
            max_sessions,
        })
    }
}

fn flag(value: Option<String>, default: bool) -> anyhow::Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("invalid boolean value: {}", other),
    }
}
