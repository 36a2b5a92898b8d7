// Chatbot prompt builders.
// The synthesis template and the policy's sentinel detector both read
// FALLBACK_SENTINEL from here; never inline the phrase anywhere else.

/// Phrase the synthesis prompt asks the model to emit when the retrieved
/// context cannot answer the question. Detection is case-insensitive.
pub const FALLBACK_SENTINEL: &str = "Let me answer you through llm's.";

/// Grounded synthesis prompt: answer from the retrieved context only, or
/// emit the sentinel and fall back to general knowledge.
pub fn build_synthesis_prompt(context: &str, question: &str) -> String {
    format!(
        "\
You are a highly intelligent AI assistant. You have been provided with context retrieved from documents and an original question.
Your task is to synthesize a comprehensive, well-phrased, and accurate answer to the question using ONLY the provided context.
If the context is relevant and sufficient, base your answer entirely on it.
If the context does NOT contain the answer to the question, or is insufficient, you MUST explicitly state \"{FALLBACK_SENTINEL}\" and then provide an answer using your own general knowledge.

Retrieved Context:
{context}

Original Question: {question}

Answer:"
    )
}

/// General-knowledge prompt, question only.
pub fn build_general_prompt(question: &str) -> String {
    format!(
        "\
You are a helpful and concise AI assistant.
Answer the following question based on your general knowledge.
If the question seems to be looking for specific information that might be in a document,
and you don't have access to that, politely state that you can only provide general information.

Question: {question}
Helpful Answer:"
    )
}
