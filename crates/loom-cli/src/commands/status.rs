//! /status and /history commands

use super::{CommandContext, CommandResult};
use crate::render::Renderer;
use loom_protocol::Message;

pub struct StatusCommand;

impl StatusCommand {
    pub fn execute(ctx: &CommandContext<'_>) -> CommandResult {
        let mut output = String::from("Session Info\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        output.push_str(&format!("Server:     {}\n", ctx.base_url));
        output.push_str(&format!(
            "Channel:    {} ({})\n",
            ctx.chat_kind.name(),
            if ctx.connected { "connected" } else { "reconnecting" }
        ));
        if !ctx.online {
            output.push_str("            server unreachable\n");
        }
        output.push_str(&format!(
            "Agent:      {}\n",
            ctx.active_agent.unwrap_or("(none)")
        ));
        output.push('\n');

        let transcript = ctx.transcript;
        let count = |pred: fn(&Message) -> bool| transcript.iter().filter(|m| pred(m)).count();
        output.push_str(&format!("Messages:   {} total\n", transcript.len()));
        output.push_str(&format!(
            "            {} user, {} assistant, {} tool calls\n",
            count(|m| matches!(m, Message::User { .. })),
            count(|m| matches!(m, Message::Assistant { .. })),
            count(|m| matches!(m, Message::ToolCall { .. })),
        ));
        output.push_str(&format!(
            "Continues:  {}\n",
            if ctx.response_id.is_some() { "yes" } else { "new conversation" }
        ));
        if !ctx.pending_attachments.is_empty() {
            output.push_str(&format!(
                "Attached:   {}\n",
                ctx.pending_attachments
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        CommandResult::Message(output)
    }

    /// The whole conversation rendered from scratch
    pub fn history(ctx: &CommandContext<'_>) -> CommandResult {
        if ctx.transcript.is_empty() {
            return CommandResult::Message("No messages yet".to_string());
        }
        let mut renderer = Renderer::new();
        CommandResult::Message(renderer.render(ctx.transcript).trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use loom_protocol::Transcript;

    #[test]
    fn test_status_counts_messages() {
        let transcript = Transcript::from(vec![
            Message::user("hi"),
            Message::assistant("hello"),
            Message::tool_call("search", "{}"),
        ]);
        let ctx = CommandContext {
            active_agent: Some("main"),
            response_id: Some("resp_1"),
            ..context(&transcript)
        };
        let CommandResult::Message(text) = StatusCommand::execute(&ctx) else {
            panic!("expected message");
        };
        assert!(text.contains("Agent:      main"));
        assert!(text.contains("1 user, 1 assistant, 1 tool calls"));
        assert!(text.contains("Continues:  yes"));
    }

    #[test]
    fn test_history_of_empty_conversation() {
        let transcript = Transcript::new();
        assert_eq!(
            StatusCommand::history(&context(&transcript)),
            CommandResult::Message("No messages yet".into())
        );
    }
}
