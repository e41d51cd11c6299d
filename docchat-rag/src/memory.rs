//! Conversation memory for one chat session.

use serde::{Deserialize, Serialize};

/// Who said a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat APIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One utterance in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Ordered history of a session, held in memory only.
///
/// Turns are appended in pairs, question then answer, so after `n`
/// successful exchanges the memory holds exactly `2n` turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed question/answer exchange.
    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ConversationTurn::user(question));
        self.turns.push(ConversationTurn::assistant(answer));
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of completed exchanges.
    pub fn exchanges(&self) -> usize {
        self.turns.len() / 2
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Render the history as `Human:` / `Assistant:` lines.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| match turn.role {
                Role::User => format!("Human: {}", turn.content),
                Role::Assistant => format!("Assistant: {}", turn.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchanges_append_question_then_answer() {
        let mut memory = ConversationMemory::new();
        memory.record_exchange("q1", "a1");
        memory.record_exchange("q2", "a2");

        assert_eq!(memory.len(), 4);
        assert_eq!(memory.exchanges(), 2);
        assert_eq!(memory.turns()[0], ConversationTurn::user("q1"));
        assert_eq!(memory.turns()[3], ConversationTurn::assistant("a2"));
        assert_eq!(memory.transcript(), "Human: q1\nAssistant: a1\nHuman: q2\nAssistant: a2");

        memory.clear();
        assert!(memory.is_empty());
    }
}
