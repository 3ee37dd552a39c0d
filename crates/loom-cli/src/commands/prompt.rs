//! /allow, /deny and /answer commands - reply to the assistant

use super::{CommandContext, CommandResult};
use loom_session::PendingPrompt;

pub struct PromptCommand;

impl PromptCommand {
    pub fn permission(allowed: bool, ctx: &CommandContext<'_>) -> CommandResult {
        match ctx.pending_prompt {
            Some(PendingPrompt::Permission(_)) => CommandResult::Permission(allowed),
            _ => CommandResult::Message("No tool request is waiting for approval".to_string()),
        }
    }

    /// `args` is a JSON object of answers, or plain text answering the
    /// first question
    pub fn answer(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        let Some(PendingPrompt::Question(question)) = ctx.pending_prompt else {
            return CommandResult::Message("No question is waiting for an answer".to_string());
        };
        if args.is_empty() {
            return CommandResult::Message("Usage: /answer <json or text>".to_string());
        }

        match serde_json::from_str::<serde_json::Value>(args) {
            Ok(value) if value.is_object() => CommandResult::Answer(value),
            _ => {
                let key = question
                    .questions
                    .first()
                    .and_then(|q| q.get("question"))
                    .and_then(|q| q.as_str())
                    .unwrap_or("answer");
                CommandResult::Answer(serde_json::json!({ key: args }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use loom_protocol::Transcript;
    use loom_protocol::events::{PermissionRequestData, QuestionData};

    #[test]
    fn test_permission_requires_pending_request() {
        let transcript = Transcript::new();
        assert!(matches!(
            PromptCommand::permission(true, &context(&transcript)),
            CommandResult::Message(_)
        ));

        let prompt = PendingPrompt::Permission(PermissionRequestData::default());
        let ctx = CommandContext {
            pending_prompt: Some(&prompt),
            ..context(&transcript)
        };
        assert_eq!(PromptCommand::permission(false, &ctx), CommandResult::Permission(false));
    }

    #[test]
    fn test_plain_answer_keys_on_first_question() {
        let transcript = Transcript::new();
        let prompt = PendingPrompt::Question(QuestionData {
            questions: vec![serde_json::json!({"question": "Which database?"})],
        });
        let ctx = CommandContext {
            pending_prompt: Some(&prompt),
            ..context(&transcript)
        };
        assert_eq!(
            PromptCommand::answer("Postgres", &ctx),
            CommandResult::Answer(serde_json::json!({"Which database?": "Postgres"}))
        );
        assert_eq!(
            PromptCommand::answer(r#"{"db": "sqlite"}"#, &ctx),
            CommandResult::Answer(serde_json::json!({"db": "sqlite"}))
        );
    }
}
