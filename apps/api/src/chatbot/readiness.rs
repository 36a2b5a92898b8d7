//! Chatbot readiness gate.
//!
//! Builds the answer policy once, lazily, on the first request that needs it.
//! Concurrent callers wait for the one in-flight build; a failed build leaves
//! the gate closed so the next request tries again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::chatbot::policy::AnswerPolicy;
use crate::config::{read_api_key, Config, GOOGLE_API_KEY_VAR};
use crate::llm_client::{LlmClient, LlmError, MODEL};
use crate::retrieval::chroma::{ChromaClient, ChromaError};
use crate::retrieval::ChromaRetriever;

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("GOOGLE_API_KEY is not set")]
    MissingCredential,

    #[error("LLM client could not be built: {0}")]
    Client(#[from] LlmError),
}

/// Builds a ready-to-use answer policy. Swapped for doubles in tests.
#[async_trait]
pub trait ComponentFactory: Send + Sync {
    async fn build(&self) -> Result<AnswerPolicy, ReadinessError>;
}

pub struct ReadinessGate {
    factory: Box<dyn ComponentFactory>,
    policy: OnceCell<Arc<AnswerPolicy>>,
}

impl ReadinessGate {
    pub fn new(factory: impl ComponentFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            policy: OnceCell::new(),
        }
    }

    /// Idempotent. Returns true once the policy exists; after the first
    /// success this never touches the factory again.
    pub async fn ensure_ready(&self) -> bool {
        if self.policy.initialized() {
            debug!("Chatbot components already initialized");
            return true;
        }

        let result = self
            .policy
            .get_or_try_init(|| async {
                info!("Initializing chatbot components...");
                self.factory.build().await.map(Arc::new)
            })
            .await;

        match result {
            Ok(policy) => {
                info!(
                    grounded = policy.is_grounded(),
                    "Chatbot components initialized"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "Chatbot initialization failed");
                false
            }
        }
    }

    /// The initialized policy, if `ensure_ready` has succeeded.
    pub fn policy(&self) -> Option<Arc<AnswerPolicy>> {
        self.policy.get().cloned()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LiveComponentFactory — Gemini + Chroma
// ────────────────────────────────────────────────────────────────────────────

/// Production factory. Requires the Gemini credential; the document index is
/// optional and its absence only disables grounded answers.
pub struct LiveComponentFactory {
    config: Config,
    key_source: fn() -> Option<String>,
}

impl LiveComponentFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            key_source: reload_api_key,
        }
    }

    #[cfg(test)]
    fn with_key_source(mut self, key_source: fn() -> Option<String>) -> Self {
        self.key_source = key_source;
        self
    }

    fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.config.google_api_key {
            return Some(key.clone());
        }
        warn!("{GOOGLE_API_KEY_VAR} not set at startup, re-checking environment");
        (self.key_source)()
    }

    /// Time allowed for attaching the index. Half the init budget at most, so
    /// a slow index still leaves room to finish in general-only mode.
    fn attach_budget(&self) -> Duration {
        (self.config.init_timeout / 2).min(self.config.retrieval_timeout)
    }

    async fn attach_index(&self, llm: LlmClient) -> Result<ChromaRetriever, ChromaError> {
        let chroma = ChromaClient::new(&self.config.chroma_url, self.config.retrieval_timeout)?;
        let budget = self.attach_budget();
        tokio::time::timeout(
            budget,
            ChromaRetriever::attach(chroma, &self.config.chroma_collection, llm),
        )
        .await
        .map_err(|_| ChromaError::Timeout(budget))?
    }
}

/// Picks up a key added to `.env` or the environment after startup.
fn reload_api_key() -> Option<String> {
    dotenvy::dotenv().ok();
    read_api_key()
}

#[async_trait]
impl ComponentFactory for LiveComponentFactory {
    async fn build(&self) -> Result<AnswerPolicy, ReadinessError> {
        let api_key = self.api_key().ok_or(ReadinessError::MissingCredential)?;

        let llm = LlmClient::new(
            api_key,
            &self.config.gemini_base_url,
            self.config.llm_timeout,
        )?;
        info!("LLM client initialized (model: {MODEL})");

        let policy = AnswerPolicy::new(Arc::new(llm.clone()), Arc::new(llm.clone())).with_limits(
            self.config.retrieval_top_k,
            self.config.retrieval_timeout,
            self.config.llm_timeout,
        );

        match self.attach_index(llm).await {
            Ok(retriever) => Ok(policy.with_retriever(Arc::new(retriever))),
            Err(e) => {
                warn!(
                    error = %e,
                    url = %self.config.chroma_url,
                    collection = %self.config.chroma_collection,
                    "Document index unavailable, running in general-knowledge-only mode"
                );
                Ok(policy)
            }
        }
    }
}
