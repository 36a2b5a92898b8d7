use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Question cannot be empty")]
pub struct EmptyQuestion;

/// A caller's question with surrounding whitespace removed. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    pub fn parse(raw: &str) -> Result<Self, EmptyQuestion> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyQuestion);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
