//! Shared types passed between pipeline stages.
//!
//! Stages import from here rather than reaching into each other's
//! internals.

pub mod change;
pub mod context;
pub mod diff;
pub mod intent;
pub mod language;
pub mod metrics;
pub mod sast;
pub mod severity;
pub mod stage;
pub mod symbols;
pub mod verdict;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use change::{ChangeMetadata, FileChange, FileStatus, TreeEntry};
pub use context::{AssembledContext, FileSnapshot};
pub use intent::IntentAnalysis;
pub use language::Language;
pub use metrics::{ChangeMetrics, ProcessingMode};
pub use sast::SastFinding;
pub use severity::Severity;
pub use stage::{StageResult, StaticAnalysisReport, SymbolOutcome};
pub use verdict::{AttemptRecord, ReviewIssue, ReviewVerdict};

/// Supported language-model backends.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderName {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    #[strum(serialize = "openai")]
    OpenAI,
    Cohere,
    Gemini,
    Perplexity,
    #[serde(rename = "deepseek")]
    #[strum(serialize = "deepseek")]
    DeepSeek,
    #[serde(rename = "xai")]
    #[strum(serialize = "xai")]
    XAI,
    Groq,
    /// Any OpenAI-compatible endpoint (Ollama, vLLM, Together, ...).
    #[serde(rename = "openai-compatible")]
    #[strum(serialize = "openai-compatible")]
    OpenAICompatible,
}

impl ProviderName {
    /// Provider-specific API key variable, as read by the provider SDKs.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
            ProviderName::OpenAI | ProviderName::OpenAICompatible => "OPENAI_API_KEY",
            ProviderName::Cohere => "COHERE_API_KEY",
            ProviderName::Gemini => "GEMINI_API_KEY",
            ProviderName::Perplexity => "PERPLEXITY_API_KEY",
            ProviderName::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderName::XAI => "XAI_API_KEY",
            ProviderName::Groq => "GROQ_API_KEY",
        }
    }

    /// Human-readable name for messages.
    pub fn label(self) -> &'static str {
        match self {
            ProviderName::Anthropic => "Anthropic",
            ProviderName::OpenAI => "OpenAI",
            ProviderName::Cohere => "Cohere",
            ProviderName::Gemini => "Gemini",
            ProviderName::Perplexity => "Perplexity",
            ProviderName::DeepSeek => "DeepSeek",
            ProviderName::XAI => "xAI",
            ProviderName::Groq => "Groq",
            ProviderName::OpenAICompatible => "OpenAI-compatible",
        }
    }

    /// Whether the provider needs an explicit `base_url`.
    pub fn requires_base_url(self) -> bool {
        self == ProviderName::OpenAICompatible
    }
}
