//! Persona profile for the digital twin
//!
//! The persona drives everything the chat page shows around the
//! conversation (title, placeholder, quick-start questions) and the wording
//! used to ask the translator for Korean output. A built-in default is used
//! unless a TOML file is supplied.
//!
//! # Example Persona File
//!
//! ```toml
//! [persona]
//! name = "Steve Jobs' Digital Twin"
//! placeholder = "What's on your mind, visionary? Think different..."
//!
//! [examples]
//! questions = ["How can I be more innovative?"]
//!
//! [translation]
//! label = "In Korean:"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// A persona profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona metadata
    pub persona: PersonaInfo,

    /// Quick-start questions shown as buttons
    #[serde(default)]
    pub examples: PersonaExamples,

    /// Translation wording
    #[serde(default)]
    pub translation: TranslationPrompt,
}

/// Persona metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaInfo {
    /// Display name, used as the page title
    pub name: String,

    /// Placeholder for the chat input
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Shown while the reply is being generated
    #[serde(default = "default_thinking")]
    pub thinking: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaExamples {
    #[serde(default)]
    pub questions: Vec<String>,
}

/// How the translator is instructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationPrompt {
    /// Label rendered above a translated reply
    #[serde(default = "default_label")]
    pub label: String,

    /// System turn forbidding any language but the target
    #[serde(default = "default_instruction")]
    pub instruction: String,

    /// User turn; `{text}` is replaced by the reply to translate
    #[serde(default = "default_request")]
    pub request: String,
}

impl TranslationPrompt {
    pub fn render_request(&self, text: &str) -> String {
        if self.request.contains("{text}") {
            self.request.replace("{text}", text)
        } else {
            format!("{} {}", self.request, text)
        }
    }
}

impl Default for TranslationPrompt {
    fn default() -> Self {
        Self {
            label: default_label(),
            instruction: default_instruction(),
            request: default_request(),
        }
    }
}

fn default_placeholder() -> String {
    builtin::PLACEHOLDER.to_string()
}

fn default_thinking() -> String {
    builtin::THINKING.to_string()
}

fn default_label() -> String {
    builtin::TRANSLATION_LABEL.to_string()
}

fn default_instruction() -> String {
    builtin::KOREAN_INSTRUCTION.to_string()
}

fn default_request() -> String {
    builtin::KOREAN_REQUEST.to_string()
}

impl Persona {
    /// Load a persona from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self, PersonaError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PersonaError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, PersonaError> {
        let persona: Persona =
            toml::from_str(content).map_err(|e| PersonaError::ParseError(e.to_string()))?;

        if persona.persona.name.trim().is_empty() {
            return Err(PersonaError::Invalid("persona name is empty".to_string()));
        }
        Ok(persona)
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            persona: PersonaInfo {
                name: builtin::NAME.to_string(),
                placeholder: default_placeholder(),
                thinking: default_thinking(),
            },
            examples: PersonaExamples {
                questions: builtin::QUESTIONS.iter().map(|q| q.to_string()).collect(),
            },
            translation: TranslationPrompt::default(),
        }
    }
}

/// Errors from persona loading
#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid persona: {0}")]
    Invalid(String),
}

/// Built-in persona that doesn't require a file
pub mod builtin {
    pub const NAME: &str = "Chat with Steve Jobs' Digital Twin";

    pub const PLACEHOLDER: &str = "What's on your mind, visionary? Think different...";

    pub const THINKING: &str = "Generating response from our Steve Jobs' agent...";

    pub const QUESTIONS: [&str; 5] = [
        "What is the future of technology?",
        "How can I be more innovative?",
        "What was your vision for Apple?",
        "How do you stay motivated?",
        "What advice would you give to young entrepreneurs?",
    ];

    pub const TRANSLATION_LABEL: &str = "In Korean:";

    pub const KOREAN_INSTRUCTION: &str = "당신은 전문적이고 정확한 번역기입니다. 주어진 텍스트를 한국어로 완벽하게 번역하세요. 절대로 영어나 다른 언어를 사용하지 마세요. 오직 한국어로만 응답해야 합니다.";

    pub const KOREAN_REQUEST: &str = "다음 텍스트를 한국어로 번역해 주세요: {text}";
}
