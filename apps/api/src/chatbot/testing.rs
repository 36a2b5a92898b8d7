//! Scripted collaborators shared by the chatbot tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::chatbot::policy::AnswerPolicy;
use crate::chatbot::responders::{ContextSynthesizer, GeneralResponder};
use crate::llm_client::LlmError;
use crate::retrieval::chroma::ChromaError;
use crate::retrieval::{Passage, RetrievalError, Retriever};

/// What a scripted collaborator does on every call.
#[derive(Clone)]
pub enum Script {
    Reply(String),
    Fail,
    Hang,
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Script::Reply(text.to_string())
    }
}

async fn hang() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

#[derive(Default)]
pub struct Calls(AtomicUsize);

impl Calls {
    fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct StubRetriever {
    passages: Option<Vec<String>>,
    hang: bool,
    pub calls: Calls,
}

impl StubRetriever {
    pub fn returning(passages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            passages: Some(passages.iter().map(|p| p.to_string()).collect()),
            hang: false,
            calls: Calls::default(),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            passages: None,
            hang: false,
            calls: Calls::default(),
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            passages: None,
            hang: true,
            calls: Calls::default(),
        })
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    async fn retrieve(&self, _question: &str, _k: u32) -> Result<Vec<Passage>, RetrievalError> {
        self.calls.record();
        if self.hang {
            hang().await;
        }
        match &self.passages {
            Some(passages) => Ok(passages.iter().map(Passage::new).collect()),
            None => Err(RetrievalError::Chroma(ChromaError::ServerUnavailable)),
        }
    }
}

/// Scripted language model; serves as synthesizer, general responder, or both.
pub struct StubModel {
    script: Script,
    pub calls: Calls,
    pub last_context: std::sync::Mutex<Option<String>>,
}

impl StubModel {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Calls::default(),
            last_context: std::sync::Mutex::new(None),
        })
    }

    async fn run(&self) -> Result<String, LlmError> {
        self.calls.record();
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail => Err(LlmError::Api {
                status: 503,
                message: "model overloaded".to_string(),
            }),
            Script::Hang => {
                hang().await;
                Err(LlmError::EmptyContent)
            }
        }
    }
}

#[async_trait]
impl ContextSynthesizer for StubModel {
    async fn synthesize(&self, context: &str, _question: &str) -> Result<String, LlmError> {
        if let Ok(mut last) = self.last_context.lock() {
            *last = Some(context.to_string());
        }
        self.run().await
    }
}

#[async_trait]
impl GeneralResponder for StubModel {
    async fn respond(&self, _question: &str) -> Result<String, LlmError> {
        self.run().await
    }
}

/// A policy wired to the given doubles with short budgets.
pub fn policy_with(
    retriever: Arc<StubRetriever>,
    synthesizer: Arc<StubModel>,
    general: Arc<StubModel>,
) -> AnswerPolicy {
    AnswerPolicy::new(synthesizer, general)
        .with_retriever(retriever)
        .with_limits(3, Duration::from_secs(2), Duration::from_secs(5))
}
