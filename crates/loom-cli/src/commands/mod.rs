//! Slash commands for interactive mode

mod agent;
mod attach;
mod prompt;
mod status;

pub use agent::AgentCommand;
pub use attach::AttachCommand;
pub use prompt::PromptCommand;
pub use status::StatusCommand;

use loom_protocol::{Attachment, ProjectSnapshot, Transcript};
use loom_session::{ChannelKind, PendingPrompt};

/// What a command can see of the running session
pub struct CommandContext<'a> {
    pub snapshot: Option<&'a ProjectSnapshot>,
    pub active_agent: Option<&'a str>,
    pub transcript: &'a Transcript,
    pub response_id: Option<&'a str>,
    pub pending_prompt: Option<&'a PendingPrompt>,
    pub pending_attachments: &'a [Attachment],
    pub chat_kind: ChannelKind,
    pub connected: bool,
    pub online: bool,
    pub base_url: &'a str,
}

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Open another agent's conversation
    SelectAgent(String),
    /// Attach a file to the next message
    Attach(Attachment),
    /// Clear the conversation here and on the server
    Reset,
    /// Stop the running turn
    Cancel,
    /// Answer a pending permission request
    Permission(bool),
    /// Answer a pending question
    Answer(serde_json::Value),
    /// Show a message to the user (not sent to the agent)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, ctx: &CommandContext<'_>) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (command, args) = match rest.split_once(' ') {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };
    let command = command.to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "agents" => AgentCommand::list(ctx),

        "agent" | "a" => AgentCommand::execute(args, ctx),

        "attach" => AttachCommand::execute(args),

        "history" => StatusCommand::history(ctx),

        "status" | "s" => StatusCommand::execute(ctx),

        "reset" | "clear" | "c" => CommandResult::Reset,

        "cancel" | "stop" => CommandResult::Cancel,

        "allow" | "y" => PromptCommand::permission(true, ctx),

        "deny" | "n" => PromptCommand::permission(false, ctx),

        "answer" => PromptCommand::answer(args, ctx),

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /agents              List agents in the project
  /agent, /a [name]    Show or switch the open agent
  /attach <path>       Attach a file to the next message
  /history             Reprint the conversation
  /status, /s          Show connection and session info
  /reset, /clear, /c   Start a fresh conversation with this agent
  /cancel, /stop       Stop the running turn (assistant)
  /allow, /y           Approve the pending tool request
  /deny, /n            Reject the pending tool request
  /answer <json>       Answer the pending question
  /quit, /exit, /q     Exit loom

Anything else is sent to the open agent."#
        .to_string()
}


#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        let transcript = Transcript::new();
        assert!(execute_command("hello", &context(&transcript)).is_none());
    }

    #[test]
    fn test_aliases() {
        let transcript = Transcript::new();
        let ctx = context(&transcript);
        assert_eq!(execute_command("/q", &ctx), Some(CommandResult::Exit));
        assert_eq!(execute_command("/CLEAR", &ctx), Some(CommandResult::Reset));
        assert_eq!(execute_command("  /cancel  ", &ctx), Some(CommandResult::Cancel));
    }

    #[test]
    fn test_unknown_command() {
        let transcript = Transcript::new();
        assert_eq!(
            execute_command("/frobnicate now", &context(&transcript)),
            Some(CommandResult::Unknown("frobnicate".into()))
        );
    }
}
