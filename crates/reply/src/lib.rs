pub mod generator;
pub mod keyword;
pub mod openai;
pub mod search;

pub use generator::{ReplyContext, ReplyGenerator};

use async_trait::async_trait;
use doorbot_core::types::ChatTurn;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API error: {0}")]
    Api(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("empty completion")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f64,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 300,
            temperature: 0.7,
        }
    }
}

/// External text-completion collaborator. The generator wraps every call
/// in a timeout and a static fallback; implementations just surface errors.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;
}
