//! Text generation for project summaries and questions.

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;

pub use gemini::GeminiClient;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI is not configured (set GEMINI_API_KEY or ai.apiKey)")]
    NotConfigured,

    #[error("AI request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AI response contained no candidates")]
    NoCandidates,
}

/// A model that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, AiError>;
}
