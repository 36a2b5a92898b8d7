//! Answer Resolution Policy — decides which answer a chatbot question gets.
//!
//! Flow: Retrieve → Synthesize → CheckSentinel → (GeneralFallback) → Done.
//!
//! Every external call is bounded by a timeout and isolated: a failed or
//! timed-out step moves to the next fallback tier instead of aborting.
//! `resolve` never returns an error; every path ends in an `Answer`.
//!
//! The policy holds no mutable state. One instance is shared by all
//! in-flight requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::chatbot::prompts::FALLBACK_SENTINEL;
use crate::chatbot::question::Question;
use crate::chatbot::responders::{ContextSynthesizer, GeneralResponder};
use crate::llm_client::LlmError;
use crate::retrieval::{NoopRetriever, Passage, RetrievalError, Retriever};

pub const EMPTY_QUESTION_MESSAGE: &str = "Question cannot be empty.";
pub const NOT_INITIALIZED_MESSAGE: &str =
    "Chatbot is not initialized. Please check server logs. API key or DB might be missing.";
pub const APOLOGY_MESSAGE: &str =
    "Sorry, an error occurred while I was trying to formulate a response.";
pub const NO_RESPONSE_MESSAGE: &str = "Sorry, I could not generate a response at this moment.";

const DEFAULT_TOP_K: u32 = 3;
const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(8);

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

/// Where the text of an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    #[serde(rename = "grounded")]
    Grounded,
    #[serde(rename = "general")]
    General,
    /// Grounded text up to and including the sentinel, then a general supplement.
    #[serde(rename = "grounded+general")]
    GroundedWithGeneral,
    /// One of the fixed service messages (empty question, apology, ...).
    #[serde(rename = "fixed")]
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub provenance: Provenance,
}

impl Answer {
    pub fn fixed(message: &str) -> Self {
        Self {
            text: message.to_string(),
            provenance: Provenance::Fixed,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-step outcomes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
enum StepError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

enum Step {
    Retrieve,
    Synthesize(Vec<Passage>),
    CheckSentinel(String),
    GeneralFallback,
    Done(Answer),
}

/// Runs one external call under `budget`. Elapsed time counts as a step failure
/// and drops the in-flight call.
async fn bounded<T, E>(
    budget: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, StepError>
where
    StepError: From<E>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result.map_err(StepError::from),
        Err(_) => Err(StepError::Timeout(budget)),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

pub struct AnswerPolicy {
    retriever: Arc<dyn Retriever>,
    synthesizer: Arc<dyn ContextSynthesizer>,
    general: Arc<dyn GeneralResponder>,
    index_attached: bool,
    top_k: u32,
    retrieval_timeout: Duration,
    llm_timeout: Duration,
}

impl AnswerPolicy {
    /// A general-knowledge-only policy. Attach an index with `with_retriever`.
    pub fn new(
        synthesizer: Arc<dyn ContextSynthesizer>,
        general: Arc<dyn GeneralResponder>,
    ) -> Self {
        Self {
            retriever: Arc::new(NoopRetriever),
            synthesizer,
            general,
            index_attached: false,
            top_k: DEFAULT_TOP_K,
            retrieval_timeout: DEFAULT_RETRIEVAL_TIMEOUT,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = retriever;
        self.index_attached = true;
        self
    }

    pub fn with_limits(
        mut self,
        top_k: u32,
        retrieval_timeout: Duration,
        llm_timeout: Duration,
    ) -> Self {
        self.top_k = top_k.max(1);
        self.retrieval_timeout = retrieval_timeout;
        self.llm_timeout = llm_timeout;
        self
    }

    /// True when grounded answers are possible (a document index is attached).
    pub fn is_grounded(&self) -> bool {
        self.index_attached
    }

    /// Resolves a question to exactly one answer.
    pub async fn resolve(&self, question: &Question) -> Answer {
        let mut step = Step::Retrieve;
        loop {
            step = match step {
                Step::Retrieve => self.retrieve(question).await,
                Step::Synthesize(passages) => self.synthesize(question, &passages).await,
                Step::CheckSentinel(answer) => self.check_sentinel(question, answer).await,
                Step::GeneralFallback => Step::Done(self.general_fallback(question).await),
                Step::Done(answer) => return answer,
            };
        }
    }

    async fn retrieve(&self, question: &Question) -> Step {
        if !self.index_attached {
            info!("No document index attached, answering from general knowledge");
            return Step::GeneralFallback;
        }

        info!(question = %question, k = self.top_k, "Chatbot: attempting retrieval");
        let result = bounded(
            self.retrieval_timeout,
            self.retriever.retrieve(question.as_str(), self.top_k),
        )
        .await;

        match result {
            Ok(passages) if passages.is_empty() => {
                info!(
                    passage_count = 0,
                    "No relevant passages found, falling back to general LLM"
                );
                Step::GeneralFallback
            }
            Ok(passages) => {
                info!(passage_count = passages.len(), "Retrieved passages");
                Step::Synthesize(passages)
            }
            Err(e) => {
                warn!(error = %e, "Retrieval failed, treating as no passages");
                Step::GeneralFallback
            }
        }
    }

    async fn synthesize(&self, question: &Question, passages: &[Passage]) -> Step {
        let context = build_context(passages);
        let result = bounded(
            self.llm_timeout,
            self.synthesizer.synthesize(&context, question.as_str()),
        )
        .await;

        match result {
            Ok(answer) => Step::CheckSentinel(answer),
            Err(e) => {
                error!(error = %e, "Grounded synthesis failed, falling back to general LLM");
                Step::GeneralFallback
            }
        }
    }

    async fn check_sentinel(&self, question: &Question, answer: String) -> Step {
        let Some(end) = sentinel_end(&answer) else {
            info!(answer_len = answer.len(), "Chatbot: grounded answer accepted");
            return Step::Done(Answer {
                text: answer,
                provenance: Provenance::Grounded,
            });
        };

        info!("Sentinel detected: context insufficient, supplementing with general knowledge");
        match self.ask_general(question).await {
            Ok(general) => Step::Done(Answer {
                text: format!("{}\n{}", &answer[..end], general),
                provenance: Provenance::GroundedWithGeneral,
            }),
            Err(e) => {
                error!(error = %e, "General supplement failed, falling back to general LLM");
                Step::GeneralFallback
            }
        }
    }

    async fn general_fallback(&self, question: &Question) -> Answer {
        info!(question = %question, "Chatbot: using general knowledge");
        match self.ask_general(question).await {
            Ok(text) => {
                info!(answer_len = text.len(), "General knowledge answer produced");
                Answer {
                    text,
                    provenance: Provenance::General,
                }
            }
            Err(StepError::Llm(LlmError::EmptyContent)) => {
                warn!("General LLM returned no text");
                Answer::fixed(NO_RESPONSE_MESSAGE)
            }
            Err(e) => {
                error!(error = %e, "General LLM call failed");
                Answer::fixed(APOLOGY_MESSAGE)
            }
        }
    }

    /// General-responder call; blank text counts as `EmptyContent`.
    async fn ask_general(&self, question: &Question) -> Result<String, StepError> {
        let text = bounded(self.llm_timeout, self.general.respond(question.as_str())).await?;
        if text.trim().is_empty() {
            return Err(StepError::Llm(LlmError::EmptyContent));
        }
        Ok(text)
    }
}

/// Joins passage texts, in retrieval order, into one synthesis context.
pub fn build_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Byte offset just past the first case-insensitive occurrence of
/// `FALLBACK_SENTINEL`, or `None` if the answer does not contain it.
///
/// The sentinel is ASCII, so a match always starts and ends on a char boundary.
pub fn sentinel_end(answer: &str) -> Option<usize> {
    let needle = FALLBACK_SENTINEL.as_bytes();
    answer
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|start| start + needle.len())
}
