//! Completion provider abstraction.

pub mod openai;

pub use openai::OpenAiProvider;

use async_trait::async_trait;

/// Text-completion backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Produces a single completion for the prompt.
    async fn complete(&self, prompt: &str, model: &str, max_tokens: u32) -> anyhow::Result<String>;
}
