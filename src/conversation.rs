//! Request types for a single conversational workflow run.
//!
//! A [`WorkflowRequest`] carries the user's query and the prior
//! conversation turns. The core reads both and persists neither.

use serde::{Deserialize, Serialize};

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user input.
    User,
    /// A previous assistant response.
    Assistant,
}

/// A single prior turn in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced this turn.
    pub role: Role,
    /// Turn text.
    pub text: String,
}

/// Creates a user turn.
#[must_use]
pub fn user_turn(text: &str) -> ConversationTurn {
    ConversationTurn {
        role: Role::User,
        text: text.to_string(),
    }
}

/// Creates an assistant turn.
#[must_use]
pub fn assistant_turn(text: &str) -> ConversationTurn {
    ConversationTurn {
        role: Role::Assistant,
        text: text.to_string(),
    }
}

/// One incoming conversational request.
///
/// Created per request and owned by the caller; the engine borrows it for
/// the lifetime of a single orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    /// The user's query text.
    pub query: String,
    /// Prior conversation turns, oldest first. Read-only.
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
}

impl WorkflowRequest {
    /// Creates a request with no prior conversation.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation: Vec::new(),
        }
    }

    /// Creates a request with prior conversation context.
    #[must_use]
    pub fn with_conversation(query: impl Into<String>, conversation: Vec<ConversationTurn>) -> Self {
        Self {
            query: query.into(),
            conversation,
        }
    }
}
