//! LLM-facing collaborators of the answer policy.
//!
//! Both traits are implemented by `LlmClient`; tests swap in scripted doubles.

use async_trait::async_trait;

use crate::chatbot::prompts::{build_general_prompt, build_synthesis_prompt};
use crate::llm_client::{LlmClient, LlmError};

/// Produces an answer grounded in retrieved context, or an answer containing
/// `FALLBACK_SENTINEL` when the context is insufficient.
#[async_trait]
pub trait ContextSynthesizer: Send + Sync {
    async fn synthesize(&self, context: &str, question: &str) -> Result<String, LlmError>;
}

/// Produces an answer from the model's own knowledge, with no context.
#[async_trait]
pub trait GeneralResponder: Send + Sync {
    async fn respond(&self, question: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl ContextSynthesizer for LlmClient {
    async fn synthesize(&self, context: &str, question: &str) -> Result<String, LlmError> {
        self.call_text(&build_synthesis_prompt(context, question)).await
    }
}

#[async_trait]
impl GeneralResponder for LlmClient {
    async fn respond(&self, question: &str) -> Result<String, LlmError> {
        self.call_text(&build_general_prompt(question)).await
    }
}
