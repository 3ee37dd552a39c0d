//! loom - talk to agents on a local dev server

mod commands;
mod config;
mod render;

use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use loom_protocol::Attachment;
use loom_session::{
    ChannelKind, FileStore, KeyValueStore, MemoryStore, PendingPrompt, Studio, StudioUpdate,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use commands::{CommandContext, CommandResult};
use render::Renderer;

/// loom - live conversations with your project's agents
#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dev server URL (default: http://127.0.0.1:8321)
    #[arg(short, long)]
    url: Option<String>,

    /// Agent to open on startup
    #[arg(short, long)]
    agent: Option<String>,

    /// Talk to the built-in studio assistant
    #[arg(long)]
    assistant: bool,

    /// Conversation storage file
    #[arg(long)]
    storage: Option<String>,

    /// Keep conversations in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("loom=debug,loom_session=debug,loom_protocol=debug")
            .with_writer(io::stderr)
            .init();
    } else if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Merge config with CLI args (CLI takes precedence)
    let mut cfg = config::Config::load();
    if args.url.is_some() {
        cfg.server_url = args.url;
    }
    if args.agent.is_some() {
        cfg.agent = args.agent;
    }
    if args.assistant {
        cfg.assistant = Some(true);
    }
    if args.storage.is_some() {
        cfg.storage_path = args.storage;
    }

    let store: Arc<dyn KeyValueStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        let path = cfg.storage_path().unwrap_or_else(FileStore::default_path);
        tracing::debug!("Storing conversations in {}", path.display());
        Arc::new(FileStore::open(path))
    };

    let studio = Studio::connect(cfg.studio_config(), store)?;

    if io::IsTerminal::is_terminal(&io::stderr()) {
        eprintln!("loom ({}) - /help for commands", cfg.server_url());
        eprintln!();
    }

    run_interactive(studio).await
}

/// Terminal front end state
struct Repl {
    studio: Studio,
    renderer: Renderer,
    attachments: Vec<Attachment>,
}

async fn run_interactive(studio: Studio) -> anyhow::Result<()> {
    let mut repl = Repl {
        studio,
        renderer: Renderer::new(),
        attachments: Vec::new(),
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !repl.handle_input(&line) {
                    break;
                }
            }
            update = repl.studio.next_update() => {
                let Some(update) = update else {
                    break;
                };
                repl.handle_update(update);
            }
        }
        io::stdout().flush()?;
    }

    repl.studio.shutdown().await;
    Ok(())
}

impl Repl {
    /// Returns false when the user asked to exit
    fn handle_input(&mut self, input: &str) -> bool {
        let input = input.trim();
        if input.is_empty() {
            return true;
        }

        let transcript = self.studio.transcript();
        let ctx = CommandContext {
            snapshot: self.studio.snapshot().map(|s| s.as_ref()),
            active_agent: self.studio.active_agent(),
            transcript: &transcript,
            response_id: self.studio.response_id(),
            pending_prompt: self.studio.pending_prompt(),
            pending_attachments: &self.attachments,
            chat_kind: self.studio.chat_kind(),
            connected: self.studio.is_connected(),
            online: self.studio.is_online(),
            base_url: self.studio.base_url(),
        };

        let Some(result) = commands::execute_command(input, &ctx) else {
            self.send(input);
            return true;
        };

        match result {
            CommandResult::Exit => return false,
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Unknown(cmd) => {
                println!("Unknown command: /{}", cmd);
                println!("Type /help for available commands.");
            }
            CommandResult::SelectAgent(agent) => {
                let transcript = self.studio.select_agent(&agent);
                println!("Opened {} ({} messages)", agent, transcript.len());
                self.redraw(&transcript);
            }
            CommandResult::Attach(attachment) => {
                println!("Attached {} to the next message", attachment.name);
                self.attachments.push(attachment);
            }
            CommandResult::Reset => {
                if self.studio.active_agent().is_none() {
                    println!("No agent open.");
                } else {
                    self.studio.reset();
                    self.renderer.reset();
                    println!("Cleared conversation.");
                }
            }
            CommandResult::Cancel => {
                if self.studio.chat_kind() != ChannelKind::Assistant {
                    println!("Only the assistant can be cancelled.");
                } else if !self.studio.cancel() {
                    println!("Not connected.");
                }
            }
            CommandResult::Permission(allowed) => {
                if !self.studio.respond_permission(allowed) {
                    println!("Not connected; answer again once reconnected.");
                }
            }
            CommandResult::Answer(answers) => {
                if !self.studio.answer_question(answers) {
                    println!("Not connected; answer again once reconnected.");
                }
            }
        }
        true
    }

    fn send(&mut self, text: &str) {
        if self.studio.active_agent().is_none() {
            println!("No agent open. Use /agents and /agent <name>.");
            return;
        }
        if !self.studio.is_connected() {
            println!("Not connected to the server; message not sent.");
            return;
        }
        let attachments = std::mem::take(&mut self.attachments);
        if self.studio.send(text, attachments) {
            let transcript = self.studio.transcript();
            print!("{}", self.renderer.render(&transcript));
        }
    }

    fn handle_update(&mut self, update: StudioUpdate) {
        match update {
            StudioUpdate::Transcript(transcript) => {
                print!("{}", self.renderer.render(&transcript));
            }
            StudioUpdate::Connection { kind, connected } => {
                if kind.is_conversation() {
                    if connected {
                        eprintln!("[connected]");
                    } else {
                        eprintln!("[disconnected, reconnecting]");
                    }
                }
            }
            StudioUpdate::Online(online) => {
                if online {
                    eprintln!("[server is back]");
                } else {
                    eprintln!("[server unreachable]");
                }
            }
            StudioUpdate::Snapshot(snapshot) => {
                if let Some(error) = snapshot.load_error() {
                    eprintln!("[project failed to load: {}]", error);
                }
            }
            StudioUpdate::AgentSelected(agent) => {
                eprintln!("[agent: {}]", agent);
                let transcript = self.studio.transcript();
                self.redraw(&transcript);
            }
            StudioUpdate::AgentRemoved(agent) => {
                eprintln!("[agent {} was removed from the project]", agent);
                self.renderer.reset();
            }
            StudioUpdate::Prompt(PendingPrompt::Permission(request)) => {
                println!(
                    "\n{} wants to run: {}\nApprove with /allow or reject with /deny",
                    request.tool, request.command
                );
            }
            StudioUpdate::Prompt(PendingPrompt::Question(question)) => {
                println!();
                for q in &question.questions {
                    let text = q.get("question").and_then(|v| v.as_str()).unwrap_or("?");
                    println!("? {}", text);
                }
                println!("Reply with /answer <text or json>");
            }
        }
    }

    fn redraw(&mut self, transcript: &loom_protocol::Transcript) {
        self.renderer.reset();
        print!("{}", self.renderer.render(transcript));
    }
}
