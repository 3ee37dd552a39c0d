//! /agents and /agent commands - list and switch agents

use super::{CommandContext, CommandResult};
use loom_protocol::ProjectSnapshot;

pub struct AgentCommand;

impl AgentCommand {
    /// Show the open agent, or switch to the agent matching `args`
    pub fn execute(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(match ctx.active_agent {
                Some(agent) => format!("Open agent: {}", agent),
                None => "No agent open. Use /agents to list them.".to_string(),
            });
        }

        let Some(snapshot) = ctx.snapshot else {
            // Nothing to check against yet.
            return CommandResult::SelectAgent(args.to_string());
        };

        match find_agent(args, snapshot) {
            Some(name) => CommandResult::SelectAgent(name),
            None => CommandResult::Message(format!(
                "No agent found matching '{}'\nUse /agents to list available agents",
                args
            )),
        }
    }

    pub fn list(ctx: &CommandContext<'_>) -> CommandResult {
        let Some(snapshot) = ctx.snapshot else {
            return CommandResult::Message("Project not loaded yet".to_string());
        };
        if let Some(error) = snapshot.load_error() {
            return CommandResult::Message(format!("Project failed to load: {}", error));
        }
        if snapshot.agents.is_empty() {
            return CommandResult::Message("No agents in this project".to_string());
        }

        let mut output = String::from("Agents:\n");
        for (name, info) in &snapshot.agents {
            let marker = if ctx.active_agent == Some(name.as_str()) {
                " *"
            } else {
                ""
            };
            let model = info.model.as_deref().unwrap_or("default model");
            output.push_str(&format!("  {:<20} {}{}\n", name, model, marker));
        }
        output.push_str("\nSwitch with: /agent <name>");
        CommandResult::Message(output)
    }
}

fn find_agent(query: &str, snapshot: &ProjectSnapshot) -> Option<String> {
    if snapshot.has_agent(query) {
        return Some(query.to_string());
    }

    let query_lower = query.to_lowercase();
    snapshot
        .agent_names()
        .find(|name| name.to_lowercase() == query_lower)
        .or_else(|| {
            snapshot
                .agent_names()
                .find(|name| name.to_lowercase().contains(&query_lower))
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::context;
    use super::*;
    use loom_protocol::{AgentInfo, Transcript};

    fn snapshot() -> ProjectSnapshot {
        let agent = |name: &str, model: Option<&str>| {
            (
                name.to_string(),
                AgentInfo {
                    name: name.to_string(),
                    model: model.map(str::to_string),
                    ..Default::default()
                },
            )
        };
        ProjectSnapshot {
            agents: vec![agent("Researcher", Some("gpt-4o")), agent("writer", None)],
            ..Default::default()
        }
    }

    #[test]
    fn test_select_matches_case_insensitively() {
        let transcript = Transcript::new();
        let snapshot = snapshot();
        let ctx = CommandContext {
            snapshot: Some(&snapshot),
            ..context(&transcript)
        };
        assert_eq!(
            AgentCommand::execute("researcher", &ctx),
            CommandResult::SelectAgent("Researcher".into())
        );
        assert_eq!(
            AgentCommand::execute("writ", &ctx),
            CommandResult::SelectAgent("writer".into())
        );
        assert!(matches!(
            AgentCommand::execute("editor", &ctx),
            CommandResult::Message(_)
        ));
    }

    #[test]
    fn test_list_marks_open_agent() {
        let transcript = Transcript::new();
        let snapshot = snapshot();
        let ctx = CommandContext {
            snapshot: Some(&snapshot),
            active_agent: Some("writer"),
            ..context(&transcript)
        };
        let CommandResult::Message(text) = AgentCommand::list(&ctx) else {
            panic!("expected message");
        };
        assert!(text.contains("gpt-4o"));
        assert!(text.lines().any(|l| l.contains("writer") && l.ends_with('*')));
        assert!(!text.lines().any(|l| l.contains("Researcher") && l.ends_with('*')));
    }

    #[test]
    fn test_select_before_snapshot_passes_through() {
        let transcript = Transcript::new();
        assert_eq!(
            AgentCommand::execute("main", &context(&transcript)),
            CommandResult::SelectAgent("main".into())
        );
    }
}
