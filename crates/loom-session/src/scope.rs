//! Binding the conversation to the currently open agent
//!
//! [`SessionScope`] is a small state machine: either no agent is open, or one
//! agent's [`AgentSession`] is. Switching agents persists the outgoing
//! session and loads the incoming one. Every transcript change is written
//! through to the [`TranscriptStore`].

use loom_protocol::{
    Attachment, ChatRequest, ClientFrame, ControlFrame, Message, ProjectSnapshot, ServerEvent,
    Transcript, reduce,
};

use crate::conversation::{AgentSession, PendingPrompt};
use crate::transcript_store::{Migration, TranscriptStore};

/// Which agent, if any, is open
#[derive(Debug, Clone)]
pub enum ScopeState {
    NoAgent,
    Active(AgentSession),
}

/// What a project snapshot did to the scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Unchanged,
    /// Legacy data was copied into the open agent, which now shows it
    Migrated { agent: String },
    /// The open agent is gone; its data was cleared and the scope is empty
    AgentRemoved { agent: String },
}

pub struct SessionScope {
    store: TranscriptStore,
    state: ScopeState,
    migrated: bool,
}

impl SessionScope {
    pub fn new(store: TranscriptStore) -> Self {
        Self {
            store,
            state: ScopeState::NoAgent,
            migrated: false,
        }
    }

    pub fn state(&self) -> &ScopeState {
        &self.state
    }

    pub fn session(&self) -> Option<&AgentSession> {
        match &self.state {
            ScopeState::Active(session) => Some(session),
            ScopeState::NoAgent => None,
        }
    }

    pub fn active_agent(&self) -> Option<&str> {
        self.session().map(|s| s.agent.as_str())
    }

    /// Current transcript; empty when no agent is open
    pub fn transcript(&self) -> Transcript {
        self.session()
            .map(|s| s.transcript.clone())
            .unwrap_or_default()
    }

    pub fn response_id(&self) -> Option<&str> {
        self.session().and_then(|s| s.response_id.as_deref())
    }

    pub fn pending_prompt(&self) -> Option<&PendingPrompt> {
        self.session().and_then(|s| s.pending_prompt.as_ref())
    }

    /// Open `agent`, persisting whichever agent was open before
    pub fn select_agent(&mut self, agent: &str) {
        if self.active_agent() == Some(agent) {
            return;
        }
        self.persist_active();
        let transcript = self.store.load(agent);
        let response_id = self.store.load_response_id(agent);
        tracing::debug!(
            "Opened agent {} ({} messages, token: {})",
            agent,
            transcript.len(),
            response_id.is_some()
        );
        self.state = ScopeState::Active(AgentSession::new(agent, transcript, response_id));
    }

    /// Close the open agent
    pub fn deselect(&mut self) {
        self.persist_active();
        self.state = ScopeState::NoAgent;
    }

    /// Fold a server event into the open conversation.
    ///
    /// Returns whether the transcript changed. Events with no agent open are
    /// ignored.
    pub fn apply_event(&mut self, event: &ServerEvent) -> bool {
        let ScopeState::Active(session) = &mut self.state else {
            tracing::debug!("Ignoring server event with no agent open");
            return false;
        };

        match event {
            ServerEvent::Done {
                response_id: Some(id),
                ..
            } => {
                session.response_id = Some(id.clone());
                if let Err(e) = self.store.save_response_id(&session.agent, Some(id)) {
                    tracing::warn!("Failed to save response id for {}: {}", session.agent, e);
                }
            }
            ServerEvent::PermissionRequest { data } => {
                session.pending_prompt = Some(PendingPrompt::Permission(data.clone()));
            }
            ServerEvent::Question { data } => {
                session.pending_prompt = Some(PendingPrompt::Question(data.clone()));
            }
            _ => {}
        }

        let next = reduce(&session.transcript, event);
        if next.ptr_eq(&session.transcript) {
            return false;
        }
        session.transcript = next;
        if let Err(e) = self.store.save(&session.agent, &session.transcript) {
            tracing::warn!("Failed to save transcript for {}: {}", session.agent, e);
        }
        true
    }

    /// Record an outgoing message and build the frame that carries it.
    ///
    /// The user message is appended before the server has seen it. Returns
    /// `None` when no agent is open.
    pub fn prepare_send(&mut self, text: &str, attachments: Vec<Attachment>) -> Option<ClientFrame> {
        let ScopeState::Active(session) = &mut self.state else {
            return None;
        };

        let request = ChatRequest {
            message: text.to_string(),
            previous_response_id: session.response_id.clone(),
            attachments: attachments.clone(),
            agent_name: Some(session.agent.clone()),
        };

        session.transcript = session
            .transcript
            .with_appended(Message::user_with_attachments(text, attachments));
        if let Err(e) = self.store.save(&session.agent, &session.transcript) {
            tracing::warn!("Failed to save transcript for {}: {}", session.agent, e);
        }

        Some(request.into())
    }

    /// Forget the open conversation locally and on the server
    pub fn reset(&mut self) -> Option<ClientFrame> {
        let ScopeState::Active(session) = &mut self.state else {
            return None;
        };
        session.transcript = Transcript::new();
        session.response_id = None;
        session.pending_prompt = None;
        if let Err(e) = self.store.clear(&session.agent) {
            tracing::warn!("Failed to clear stored conversation for {}: {}", session.agent, e);
        }
        Some(ClientFrame::clear())
    }

    /// Frame asking the server to stop the running turn
    pub fn cancel(&self) -> ClientFrame {
        ClientFrame::cancel()
    }

    /// Answer a pending permission request
    pub fn respond_permission(&mut self, allowed: bool) -> Option<ClientFrame> {
        match self.take_prompt()? {
            PendingPrompt::Permission(_) => {
                Some(ControlFrame::PermissionResponse { allowed }.into())
            }
            other => {
                self.restore_prompt(other);
                None
            }
        }
    }

    /// Answer a pending question
    pub fn answer_question(&mut self, answers: serde_json::Value) -> Option<ClientFrame> {
        match self.take_prompt()? {
            PendingPrompt::Question(_) => Some(ControlFrame::QuestionResponse { answers }.into()),
            other => {
                self.restore_prompt(other);
                None
            }
        }
    }

    /// React to a fresh project snapshot.
    ///
    /// Runs the legacy migration the first time a snapshot with agents is
    /// seen, and closes the open agent if the snapshot no longer has it.
    pub fn apply_snapshot(&mut self, snapshot: &ProjectSnapshot) -> SnapshotOutcome {
        let mut migrated_into = None;
        if !self.migrated {
            match self.store.migrate_legacy(snapshot) {
                Ok(Migration::NoAgents) => {}
                Ok(migration) => {
                    tracing::debug!("Legacy migration: {:?}", migration);
                    if let Migration::Copied { agent } = migration {
                        migrated_into = Some(agent);
                    }
                    self.migrated = true;
                }
                Err(e) => {
                    tracing::warn!("Legacy migration failed: {}", e);
                    self.migrated = true;
                }
            }
        }

        let Some(agent) = self.active_agent().map(str::to_string) else {
            return SnapshotOutcome::Unchanged;
        };
        if snapshot.has_agent(&agent) {
            // The open session was empty, so the copied data replaces it.
            if migrated_into.as_deref() == Some(agent.as_str()) {
                self.reload_active();
                return SnapshotOutcome::Migrated { agent };
            }
            return SnapshotOutcome::Unchanged;
        }

        tracing::info!("Agent {} no longer exists, closing its conversation", agent);
        if let Err(e) = self.store.clear(&agent) {
            tracing::warn!("Failed to clear stored conversation for {}: {}", agent, e);
        }
        self.state = ScopeState::NoAgent;
        SnapshotOutcome::AgentRemoved { agent }
    }

    /// Re-read the open agent's conversation from storage
    fn reload_active(&mut self) {
        if let ScopeState::Active(session) = &mut self.state {
            session.transcript = self.store.load(&session.agent);
            session.response_id = self.store.load_response_id(&session.agent);
        }
    }

    fn take_prompt(&mut self) -> Option<PendingPrompt> {
        match &mut self.state {
            ScopeState::Active(session) => session.pending_prompt.take(),
            ScopeState::NoAgent => None,
        }
    }

    fn restore_prompt(&mut self, prompt: PendingPrompt) {
        if let ScopeState::Active(session) = &mut self.state {
            session.pending_prompt = Some(prompt);
        }
    }

    fn persist_active(&self) {
        let Some(session) = self.session() else {
            return;
        };
        // An empty conversation leaves no key behind.
        if !session.transcript.is_empty() {
            if let Err(e) = self.store.save(&session.agent, &session.transcript) {
                tracing::warn!("Failed to save transcript for {}: {}", session.agent, e);
            }
        }
        if let Err(e) = self
            .store
            .save_response_id(&session.agent, session.response_id.as_deref())
        {
            tracing::warn!("Failed to save response id for {}: {}", session.agent, e);
        }
    }
}
