//! Per-agent conversation state: transcript, continuation token, pending prompt.

use loom_protocol::events::{PermissionRequestData, QuestionData};
use loom_protocol::Transcript;

/// Conversation state for the agent that is currently open
#[derive(Debug, Clone)]
pub struct AgentSession {
    /// Agent name; also the persistence scope
    pub agent: String,
    /// Messages so far
    pub transcript: Transcript,
    /// Token the server needs to resume its context on the next turn
    pub response_id: Option<String>,
    /// Question or approval the server is waiting on
    pub pending_prompt: Option<PendingPrompt>,
}

impl AgentSession {
    pub fn new(agent: impl Into<String>, transcript: Transcript, response_id: Option<String>) -> Self {
        Self {
            agent: agent.into(),
            transcript,
            response_id,
            pending_prompt: None,
        }
    }
}

/// Something the assistant asked the user to answer
#[derive(Debug, Clone, PartialEq)]
pub enum PendingPrompt {
    Permission(PermissionRequestData),
    Question(QuestionData),
}
