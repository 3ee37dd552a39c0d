//! Wire protocol: frames received from and sent to the dev server

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::snapshot::ProjectSnapshot;
use crate::types::Attachment;

/// Payload of a `tool_call` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallData {
    #[serde(default = "default_tool_name")]
    pub tool: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub arguments: String,
}

fn default_tool_name() -> String {
    "tool".to_string()
}

/// Payload of a `tool_result` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResultData {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub output: String,
}

/// Payload of an assistant-channel `tool_use` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolUseData {
    pub tool: String,
    pub detail: String,
    pub args: String,
}

/// Payload of an assistant-channel `permission_request` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionRequestData {
    pub tool: String,
    pub command: String,
}

/// Payload of an assistant-channel `question` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionData {
    pub questions: Vec<serde_json::Value>,
}

/// Events received on a conversation channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Reasoning text delta
    Thinking {
        #[serde(default, deserialize_with = "string_or_empty")]
        data: String,
    },

    /// Reply text delta
    Token {
        #[serde(default, deserialize_with = "string_or_empty")]
        data: String,
    },

    /// A tool started running
    ToolCall { data: ToolCallData },

    /// The most recent running tool finished
    ToolResult {
        #[serde(default)]
        data: ToolResultData,
    },

    /// The turn is over
    Done {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        data: Option<String>,
    },

    /// The server failed to process the turn
    Error {
        #[serde(default, deserialize_with = "string_or_empty")]
        data: String,
    },

    /// A tool the assistant already ran
    ToolUse { data: ToolUseData },

    /// The assistant wants approval to run a command
    PermissionRequest { data: PermissionRequestData },

    /// The assistant asks the user one or more questions
    Question { data: QuestionData },

    /// Anything this client does not understand
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Parse a text frame
    pub fn parse(frame: &str) -> Result<Self> {
        parse_object(frame)
    }

    /// Whether this event ends the current turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerEvent::Done { .. } | ServerEvent::Error { .. })
    }

    /// Whether this event needs an answer from the user
    pub fn is_prompt(&self) -> bool {
        matches!(
            self,
            ServerEvent::PermissionRequest { .. } | ServerEvent::Question { .. }
        )
    }
}

/// Events received on the project-change channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectEvent {
    /// The project was reloaded after a file change
    Reload {
        #[serde(default)]
        snapshot: ProjectSnapshot,
    },

    #[serde(other)]
    Unknown,
}

impl ProjectEvent {
    /// Parse a text frame
    pub fn parse(frame: &str) -> Result<Self> {
        parse_object(frame)
    }
}

/// A user message sent to the agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

/// Control frames understood by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Discard server-side conversation context
    Clear,
    /// Stop the running turn (assistant channel)
    Cancel,
    /// Answer to a `permission_request`
    PermissionResponse { allowed: bool },
    /// Answer to a `question`
    QuestionResponse { answers: serde_json::Value },
}

/// Any frame the client sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    Chat(ChatRequest),
    Control(ControlFrame),
}

impl ClientFrame {
    pub fn clear() -> Self {
        ClientFrame::Control(ControlFrame::Clear)
    }

    pub fn cancel() -> Self {
        ClientFrame::Control(ControlFrame::Cancel)
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<ChatRequest> for ClientFrame {
    fn from(request: ChatRequest) -> Self {
        ClientFrame::Chat(request)
    }
}

impl From<ControlFrame> for ClientFrame {
    fn from(control: ControlFrame) -> Self {
        ClientFrame::Control(control)
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(frame: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(frame)?;
    if !value.is_object() {
        return Err(Error::UnexpectedFrame(frame.chars().take(80).collect()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Accept a string, treat `null` as empty and render anything else as JSON text
fn string_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
