//! Folding server events into a transcript
//!
//! [`reduce`] is a pure function: it never mutates its input, never fails,
//! and returns a transcript sharing the input's allocation when the event has
//! no visible effect.

use crate::events::ServerEvent;
use crate::transcript::Transcript;
use crate::types::{Message, ToolStatus};

/// Apply one server event to a transcript
pub fn reduce(transcript: &Transcript, event: &ServerEvent) -> Transcript {
    match event {
        ServerEvent::Thinking { data } => append_thinking(transcript, data),
        ServerEvent::Token { data } => append_token(transcript, data),
        ServerEvent::ToolCall { data } => {
            transcript.with_appended(Message::tool_call(&data.tool, &data.arguments))
        }
        ServerEvent::ToolResult { data } => resolve_tool_result(transcript, &data.output),
        ServerEvent::Done { .. } => finish_running_tools(transcript),
        ServerEvent::Error { data } => transcript.with_appended(Message::system(format_error(data))),
        ServerEvent::ToolUse { data } => transcript.with_appended(Message::ToolCall {
            tool: data.tool.clone(),
            arguments: data.args.clone(),
            output: data.detail.clone(),
            status: ToolStatus::Done,
        }),
        ServerEvent::PermissionRequest { .. } | ServerEvent::Question { .. } | ServerEvent::Unknown => {
            transcript.clone()
        }
    }
}

/// Apply events in order
pub fn reduce_all<'a>(
    transcript: &Transcript,
    events: impl IntoIterator<Item = &'a ServerEvent>,
) -> Transcript {
    events
        .into_iter()
        .fold(transcript.clone(), |acc, event| reduce(&acc, event))
}

/// Text of the system notice shown for a server error
pub fn format_error(message: &str) -> String {
    format!("Error: {}", message)
}

fn append_token(transcript: &Transcript, delta: &str) -> Transcript {
    if delta.is_empty() {
        return transcript.clone();
    }
    match transcript.last() {
        Some(Message::Assistant { content }) => {
            let index = transcript.len() - 1;
            transcript.with_replaced(index, Message::assistant(format!("{}{}", content, delta)))
        }
        _ => transcript.with_appended(Message::assistant(delta)),
    }
}

fn append_thinking(transcript: &Transcript, delta: &str) -> Transcript {
    if delta.is_empty() {
        return transcript.clone();
    }
    // Blank assistant placeholders may sit between a thinking block and the
    // next thinking delta; look through them.
    let target = transcript
        .iter()
        .enumerate()
        .rev()
        .find(|(_, message)| !message.is_blank_assistant());

    match target {
        Some((index, Message::Thinking { content })) => {
            transcript.with_replaced(index, Message::thinking(format!("{}{}", content, delta)))
        }
        _ => transcript.with_appended(Message::thinking(delta)),
    }
}

fn resolve_tool_result(transcript: &Transcript, output: &str) -> Transcript {
    let running = transcript
        .iter()
        .enumerate()
        .rev()
        .find(|(_, message)| message.is_running_tool_call());

    match running {
        Some((index, Message::ToolCall { tool, arguments, .. })) => transcript.with_replaced(
            index,
            Message::ToolCall {
                tool: tool.clone(),
                arguments: arguments.clone(),
                output: output.to_string(),
                status: ToolStatus::Done,
            },
        ),
        _ => {
            tracing::debug!("Dropping tool result with no running tool call");
            transcript.clone()
        }
    }
}

fn finish_running_tools(transcript: &Transcript) -> Transcript {
    if !transcript.iter().any(Message::is_running_tool_call) {
        return transcript.clone();
    }
    transcript
        .iter()
        .map(|message| match message {
            Message::ToolCall {
                tool,
                arguments,
                output,
                status: ToolStatus::Running,
            } => Message::ToolCall {
                tool: tool.clone(),
                arguments: arguments.clone(),
                output: output.clone(),
                status: ToolStatus::Done,
            },
            other => other.clone(),
        })
        .collect::<Vec<_>>()
        .into()
}
