//! Core conversation types

use serde::{Deserialize, Serialize};

/// Kind of a user attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

impl AttachmentKind {
    /// Pick the attachment kind for a MIME type
    pub fn for_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        }
    }
}

/// A file or image attached to a user message.
///
/// `data` holds the base64 payload while the message is in memory or on the
/// wire. Persisted copies drop it (see [`Message::for_storage`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub name: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Attachment {
    /// Create an attachment carrying a base64 payload
    pub fn new(
        kind: AttachmentKind,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            mime_type: mime_type.into(),
            data: Some(data.into()),
        }
    }

    /// Copy of this attachment with the payload removed
    pub fn stripped(&self) -> Self {
        Self {
            data: None,
            ..self.clone()
        }
    }

    pub fn has_payload(&self) -> bool {
        self.data.is_some()
    }
}

/// Execution status of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Running,
    Done,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Message typed by the user
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
    },
    /// Assistant reply, grown by token deltas
    Assistant { content: String },
    /// Notice generated on the client (errors)
    System { content: String },
    /// Intermediate reasoning, grown by thinking deltas
    Thinking { content: String },
    /// Tool invocation and, once resolved, its output
    ToolCall {
        tool: String,
        #[serde(default)]
        arguments: String,
        #[serde(default)]
        output: String,
        status: ToolStatus,
    },
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    /// Create a user message with attachments
    pub fn user_with_attachments(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Message::User {
            content: content.into(),
            attachments,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn thinking(content: impl Into<String>) -> Self {
        Message::Thinking {
            content: content.into(),
        }
    }

    /// Create a running tool call with no output yet
    pub fn tool_call(tool: impl Into<String>, arguments: impl Into<String>) -> Self {
        Message::ToolCall {
            tool: tool.into(),
            arguments: arguments.into(),
            output: String::new(),
            status: ToolStatus::Running,
        }
    }

    /// Role name as it appears in the serialized form
    pub fn role(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::System { .. } => "system",
            Message::Thinking { .. } => "thinking",
            Message::ToolCall { .. } => "tool_call",
        }
    }

    /// Primary text of the message (tool output for tool calls)
    pub fn text(&self) -> &str {
        match self {
            Message::User { content, .. }
            | Message::Assistant { content }
            | Message::System { content }
            | Message::Thinking { content } => content,
            Message::ToolCall { output, .. } => output,
        }
    }

    pub fn is_running_tool_call(&self) -> bool {
        matches!(
            self,
            Message::ToolCall {
                status: ToolStatus::Running,
                ..
            }
        )
    }

    /// An assistant message with no visible text yet
    pub fn is_blank_assistant(&self) -> bool {
        matches!(self, Message::Assistant { content } if content.trim().is_empty())
    }

    /// Copy suitable for persistence: attachment payloads are dropped
    pub fn for_storage(&self) -> Message {
        match self {
            Message::User {
                content,
                attachments,
            } if attachments.iter().any(Attachment::has_payload) => Message::User {
                content: content.clone(),
                attachments: attachments.iter().map(Attachment::stripped).collect(),
            },
            other => other.clone(),
        }
    }
}
