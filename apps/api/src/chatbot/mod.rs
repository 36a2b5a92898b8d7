// Career chatbot: retrieval-augmented answers with a general-knowledge fallback.
// All LLM calls go through llm_client; all index access goes through retrieval.

pub mod handlers;
pub mod policy;
pub mod prompts;
pub mod question;
pub mod readiness;
pub mod responders;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::chatbot::policy::{
    Answer, AnswerPolicy, EMPTY_QUESTION_MESSAGE, NOT_INITIALIZED_MESSAGE,
};
use crate::chatbot::question::Question;
use crate::chatbot::readiness::ReadinessGate;

/// The chatbot service owned by `AppState`.
pub struct Chatbot {
    gate: ReadinessGate,
    init_timeout: Duration,
}

/// Outward readiness report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    /// False while not ready, or when running without a document index.
    pub grounded: bool,
}

impl Chatbot {
    pub fn new(gate: ReadinessGate, init_timeout: Duration) -> Self {
        Self { gate, init_timeout }
    }

    /// Runs the readiness gate, giving up after the init budget.
    pub async fn ensure_ready(&self) -> Readiness {
        let ready = match tokio::time::timeout(self.init_timeout, self.gate.ensure_ready()).await
        {
            Ok(ready) => ready,
            Err(_) => {
                warn!(
                    timeout = ?self.init_timeout,
                    "Chatbot initialization did not finish in time"
                );
                false
            }
        };
        let grounded = ready && self.gate.policy().is_some_and(|p| p.is_grounded());
        Readiness { ready, grounded }
    }

    /// The answer policy, or `None` if initialization failed or ran out of time.
    pub async fn ready_policy(&self) -> Option<Arc<AnswerPolicy>> {
        if self.ensure_ready().await.ready {
            self.gate.policy()
        } else {
            None
        }
    }

    /// Answers one raw question.
    ///
    /// Blank input is rejected before any initialization or external call.
    pub async fn answer(&self, raw_question: &str) -> Answer {
        let Ok(question) = Question::parse(raw_question) else {
            return Answer::fixed(EMPTY_QUESTION_MESSAGE);
        };

        match self.ready_policy().await {
            Some(policy) => policy.resolve(&question).await,
            None => Answer::fixed(NOT_INITIALIZED_MESSAGE),
        }
    }
}
