//! Document retrieval for grounded chatbot answers.
//!
//! The index is pre-built and read-only from this service's point of view.
//! When it cannot be reached at startup the chatbot runs with `NoopRetriever`
//! and answers from general knowledge only.

use async_trait::async_trait;
use thiserror::Error;

use crate::llm_client::LlmError;

pub mod chroma;

pub use chroma::ChromaRetriever;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Chroma error: {0}")]
    Chroma(#[from] chroma::ChromaError),

    #[error("Question embedding failed: {0}")]
    Embedding(#[from] LlmError),
}

/// One retrieved text fragment, in the rank order the index returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub text: String,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Top-k similarity search over the document index.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, question: &str, k: u32) -> Result<Vec<Passage>, RetrievalError>;
}

/// Retriever used in general-knowledge-only mode. Always returns no passages.
pub struct NoopRetriever;

#[async_trait]
impl Retriever for NoopRetriever {
    async fn retrieve(&self, _question: &str, _k: u32) -> Result<Vec<Passage>, RetrievalError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_retriever_returns_nothing() {
        let passages = NoopRetriever.retrieve("anything", 3).await.unwrap();
        assert!(passages.is_empty());
    }
}
