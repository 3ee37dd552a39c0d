//! Incremental transcript printing
//!
//! Transcript snapshots arrive many times per reply. [`Renderer`] remembers
//! what it printed last and emits only the difference, so streamed tokens
//! appear in place on the terminal.

use loom_protocol::{Message, ToolStatus, Transcript};

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

const TOOL_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Default)]
pub struct Renderer {
    seen: Vec<Message>,
    /// Index of the streaming message whose text ends the last printed line
    open: Option<usize>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything printed; the next render starts over
    pub fn reset(&mut self) {
        self.seen.clear();
        self.open = None;
    }

    /// Text to print to bring the terminal up to date with `transcript`
    pub fn render(&mut self, transcript: &Transcript) -> String {
        let messages = transcript.messages();
        let mut out = String::new();

        if messages.len() < self.seen.len() {
            self.close_line(&mut out);
            self.seen.clear();
        }

        for (index, message) in messages.iter().enumerate() {
            let old = match self.seen.get(index) {
                Some(old) if old == message => continue,
                other => other.cloned(),
            };
            let Some(old) = old else {
                // Placeholders print nothing and leave the open line alone.
                if !message.is_blank_assistant() {
                    self.close_line(&mut out);
                    self.print(index, message, &mut out);
                }
                continue;
            };

            let streaming = self.open == Some(index);
            match (&old, message) {
                (Message::Assistant { content: before }, Message::Assistant { content: after })
                | (Message::Thinking { content: before }, Message::Thinking { content: after })
                    if streaming && after.starts_with(before.as_str()) =>
                {
                    out.push_str(&after[before.len()..]);
                }
                (
                    Message::ToolCall { tool, .. },
                    Message::ToolCall {
                        output,
                        status: ToolStatus::Done,
                        ..
                    },
                ) => {
                    self.close_line(&mut out);
                    out.push_str(&format!(
                        "  <- {}: {}\n",
                        tool,
                        truncate_chars(output, TOOL_PREVIEW_CHARS)
                    ));
                }
                _ => {
                    self.close_line(&mut out);
                    self.print(index, message, &mut out);
                }
            }
        }

        self.seen = messages.to_vec();
        out
    }

    fn close_line(&mut self, out: &mut String) {
        if self.open.take().is_some() {
            out.push('\n');
        }
    }

    fn print(&mut self, index: usize, message: &Message, out: &mut String) {
        match message {
            Message::User {
                content,
                attachments,
            } => {
                out.push_str(&format!("> {}\n", content));
                for attachment in attachments {
                    out.push_str(&format!(
                        "  [attached {} ({})]\n",
                        attachment.name, attachment.mime_type
                    ));
                }
            }
            Message::Assistant { content } => {
                out.push_str(content);
                self.open = Some(index);
            }
            Message::Thinking { content } => {
                out.push_str("(thinking) ");
                out.push_str(content);
                self.open = Some(index);
            }
            Message::System { content } => out.push_str(&format!("! {}\n", content)),
            Message::ToolCall {
                tool,
                arguments,
                output,
                status,
            } => {
                out.push_str(&format!(
                    "  -> {} {}\n",
                    tool,
                    truncate_chars(arguments, TOOL_PREVIEW_CHARS)
                ));
                if *status == ToolStatus::Done {
                    out.push_str(&format!(
                        "  <- {}: {}\n",
                        tool,
                        truncate_chars(output, TOOL_PREVIEW_CHARS)
                    ));
                }
            }
        }
    }
}
