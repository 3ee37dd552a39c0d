//! The session engine as one driver
//!
//! [`Studio`] owns the channels, the session scope and the latest project
//! snapshot. A presentation layer polls [`Studio::next_update`] and calls the
//! intent methods; all transcript mutation happens on the caller's task.

use std::collections::VecDeque;
use std::sync::Arc;

use loom_protocol::{
    Attachment, ClientFrame, ProjectEvent, ProjectSnapshot, ServerEvent, Transcript,
};
use tokio::sync::{mpsc, watch};

use crate::connection::{Channel, ConnectionManager};
use crate::conversation::PendingPrompt;
use crate::error::Result;
use crate::events::{ChannelEvent, ChannelKind};
use crate::liveness::{HttpProbe, LivenessProbe};
use crate::project::{PROJECT_PATH, ProjectClient, SnapshotSource};
use crate::scope::{SessionScope, SnapshotOutcome};
use crate::storage::KeyValueStore;
use crate::transcript_store::TranscriptStore;
use crate::transport::{Connector, ReconnectConfig, WebSocketConnector};

/// Settings for a [`Studio`]
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// HTTP base URL of the dev server
    pub base_url: String,
    /// Talk to the built-in assistant instead of project agents
    pub assistant: bool,
    /// Agent to open when the first snapshot arrives
    pub default_agent: Option<String>,
    pub reconnect: ReconnectConfig,
    /// Path probed to decide whether the server is up
    pub status_path: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8321".to_string(),
            assistant: false,
            default_agent: None,
            reconnect: ReconnectConfig::default(),
            status_path: PROJECT_PATH.to_string(),
        }
    }
}

/// Something the presentation layer should react to
#[derive(Debug, Clone, PartialEq)]
pub enum StudioUpdate {
    /// A channel connected or dropped
    Connection { kind: ChannelKind, connected: bool },
    /// Server reachability changed
    Online(bool),
    /// The open conversation changed
    Transcript(Transcript),
    /// A new project snapshot arrived
    Snapshot(Arc<ProjectSnapshot>),
    /// An agent was opened without an explicit request
    AgentSelected(String),
    /// The open agent disappeared from the project
    AgentRemoved(String),
    /// The assistant is waiting for an answer
    Prompt(PendingPrompt),
}

pub struct Studio {
    manager: ConnectionManager,
    chat: Channel,
    project: Channel,
    scope: SessionScope,
    snapshots: Arc<dyn SnapshotSource>,
    snapshot: Option<Arc<ProjectSnapshot>>,
    default_agent: Option<String>,
    auto_selected: bool,
    online: watch::Receiver<bool>,
    fetched_tx: mpsc::UnboundedSender<Result<ProjectSnapshot>>,
    fetched_rx: mpsc::UnboundedReceiver<Result<ProjectSnapshot>>,
    queued: VecDeque<StudioUpdate>,
}

impl Studio {
    /// Connect to a dev server over WebSocket and HTTP
    pub fn connect(config: StudioConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let client = reqwest::Client::new();
        let probe = HttpProbe::for_server(client.clone(), &config.base_url, &config.status_path);
        let snapshots = ProjectClient::new(client, config.base_url.clone());
        Self::with_parts(
            config,
            Arc::new(WebSocketConnector::new()),
            Arc::new(probe),
            Arc::new(snapshots),
            store,
        )
    }

    /// Build a studio from explicit collaborators
    pub fn with_parts(
        config: StudioConfig,
        connector: Arc<dyn Connector>,
        probe: Arc<dyn LivenessProbe>,
        snapshots: Arc<dyn SnapshotSource>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let mut manager =
            ConnectionManager::mount(config.base_url.clone(), connector, probe, config.reconnect);
        let chat_kind = if config.assistant {
            ChannelKind::Assistant
        } else {
            ChannelKind::Conversation
        };
        let chat = manager.open(chat_kind)?;
        let project = manager.open(ChannelKind::ProjectChanges)?;
        let online = manager.online();
        let (fetched_tx, fetched_rx) = mpsc::unbounded_channel();

        Ok(Self {
            manager,
            chat,
            project,
            scope: SessionScope::new(TranscriptStore::new(store)),
            snapshots,
            snapshot: None,
            default_agent: config.default_agent,
            auto_selected: false,
            online,
            fetched_tx,
            fetched_rx,
            queued: VecDeque::new(),
        })
    }

    /// Wait for the next update.
    ///
    /// Cancel-safe: dropping the future loses nothing. Returns `None` once
    /// every channel task has ended.
    pub async fn next_update(&mut self) -> Option<StudioUpdate> {
        loop {
            if let Some(update) = self.queued.pop_front() {
                return Some(update);
            }

            tokio::select! {
                event = self.chat.events.recv() => {
                    let event = event?;
                    self.handle_chat_event(event);
                }
                event = self.project.events.recv() => {
                    let event = event?;
                    self.handle_project_event(event);
                }
                Some(fetched) = self.fetched_rx.recv() => match fetched {
                    Ok(snapshot) => self.handle_snapshot(snapshot),
                    Err(e) if e.is_transient() => {
                        tracing::debug!("Project snapshot unavailable: {}", e)
                    }
                    Err(e) => tracing::warn!("Failed to fetch project snapshot: {}", e),
                },
                changed = self.online.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    let online = *self.online.borrow_and_update();
                    self.queued.push_back(StudioUpdate::Online(online));
                }
            }
        }
    }

    fn handle_chat_event(&mut self, event: ChannelEvent) {
        let kind = self.chat.kind();
        match event {
            ChannelEvent::Connected => self.queued.push_back(StudioUpdate::Connection {
                kind,
                connected: true,
            }),
            ChannelEvent::Disconnected => self.queued.push_back(StudioUpdate::Connection {
                kind,
                connected: false,
            }),
            ChannelEvent::Frame(text) => {
                let event = match ServerEvent::parse(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("Dropping malformed {} frame: {}", kind.name(), e);
                        return;
                    }
                };
                if self.scope.apply_event(&event) {
                    self.queued
                        .push_back(StudioUpdate::Transcript(self.scope.transcript()));
                }
                if event.is_prompt() {
                    if let Some(prompt) = self.scope.pending_prompt() {
                        self.queued.push_back(StudioUpdate::Prompt(prompt.clone()));
                    }
                }
            }
        }
    }

    fn handle_project_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.queued.push_back(StudioUpdate::Connection {
                    kind: ChannelKind::ProjectChanges,
                    connected: true,
                });
                self.request_snapshot();
            }
            ChannelEvent::Disconnected => self.queued.push_back(StudioUpdate::Connection {
                kind: ChannelKind::ProjectChanges,
                connected: false,
            }),
            ChannelEvent::Frame(text) => match ProjectEvent::parse(&text) {
                Ok(ProjectEvent::Reload { snapshot }) => self.handle_snapshot(snapshot),
                Ok(ProjectEvent::Unknown) => {}
                Err(e) => tracing::warn!("Dropping malformed reload frame: {}", e),
            },
        }
    }

    /// Fetch a snapshot in the background; the result comes back through
    /// `fetched_rx`.
    fn request_snapshot(&self) {
        let snapshots = self.snapshots.clone();
        let tx = self.fetched_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(snapshots.fetch_snapshot().await);
        });
    }

    fn handle_snapshot(&mut self, snapshot: ProjectSnapshot) {
        if let Some(error) = snapshot.load_error() {
            tracing::warn!("Project failed to load: {}", error);
        }

        let outcome = self.scope.apply_snapshot(&snapshot);
        let snapshot = Arc::new(snapshot);
        self.snapshot = Some(snapshot.clone());
        self.queued.push_back(StudioUpdate::Snapshot(snapshot.clone()));

        match outcome {
            SnapshotOutcome::AgentRemoved { agent } => {
                self.queued.push_back(StudioUpdate::AgentRemoved(agent));
                self.queued
                    .push_back(StudioUpdate::Transcript(self.scope.transcript()));
            }
            SnapshotOutcome::Migrated { .. } => {
                self.queued
                    .push_back(StudioUpdate::Transcript(self.scope.transcript()));
            }
            SnapshotOutcome::Unchanged => {}
        }

        if self.auto_selected || self.scope.active_agent().is_some() {
            return;
        }
        let choice = self
            .default_agent
            .as_deref()
            .filter(|name| snapshot.has_agent(name))
            .or_else(|| snapshot.first_agent())
            .map(str::to_string);
        if let Some(agent) = choice {
            self.auto_selected = true;
            self.scope.select_agent(&agent);
            self.queued.push_back(StudioUpdate::AgentSelected(agent));
            self.queued
                .push_back(StudioUpdate::Transcript(self.scope.transcript()));
        }
    }

    /// Open `agent` and return its transcript
    pub fn select_agent(&mut self, agent: &str) -> Transcript {
        self.auto_selected = true;
        self.scope.select_agent(agent);
        self.scope.transcript()
    }

    /// Send a user message. Dropped unless the conversation channel is open
    /// and an agent is selected.
    pub fn send(&mut self, text: &str, attachments: Vec<Attachment>) -> bool {
        if !self.chat.handle.is_open() {
            tracing::debug!("Not connected, dropping message");
            return false;
        }
        match self.scope.prepare_send(text, attachments) {
            Some(frame) => self.chat.handle.send(&frame),
            None => {
                tracing::debug!("No agent selected, dropping message");
                false
            }
        }
    }

    /// Clear the open conversation here and on the server
    pub fn reset(&mut self) -> bool {
        match self.scope.reset() {
            Some(frame) => self.chat.handle.send(&frame),
            None => false,
        }
    }

    /// Ask the server to stop the running turn
    pub fn cancel(&mut self) -> bool {
        if self.chat_kind() != ChannelKind::Assistant {
            tracing::debug!("Cancel is only understood by the assistant channel");
            return false;
        }
        let frame = self.scope.cancel();
        self.chat.handle.send(&frame)
    }

    pub fn respond_permission(&mut self, allowed: bool) -> bool {
        self.send_answer(|scope| scope.respond_permission(allowed))
    }

    pub fn answer_question(&mut self, answers: serde_json::Value) -> bool {
        self.send_answer(|scope| scope.answer_question(answers))
    }

    fn send_answer(&mut self, answer: impl FnOnce(&mut SessionScope) -> Option<ClientFrame>) -> bool {
        match answer(&mut self.scope) {
            Some(frame) => self.chat.handle.send(&frame),
            None => {
                tracing::debug!("No matching prompt is pending");
                false
            }
        }
    }

    pub fn transcript(&self) -> Transcript {
        self.scope.transcript()
    }

    pub fn active_agent(&self) -> Option<&str> {
        self.scope.active_agent()
    }

    pub fn response_id(&self) -> Option<&str> {
        self.scope.response_id()
    }

    pub fn pending_prompt(&self) -> Option<&PendingPrompt> {
        self.scope.pending_prompt()
    }

    pub fn snapshot(&self) -> Option<&Arc<ProjectSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn chat_kind(&self) -> ChannelKind {
        self.chat.kind()
    }

    pub fn is_connected(&self) -> bool {
        self.chat.handle.is_open()
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn base_url(&self) -> &str {
        self.manager.base_url()
    }

    /// Persist the open conversation and close every channel
    pub async fn shutdown(mut self) {
        self.scope.deselect();
        self.manager.unmount().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::mock::MockProbe;
    use crate::project::mock::MockSnapshots;
    use crate::storage::MemoryStore;
    use crate::events::ChannelState;
    use crate::transport::mock::{MockConnector, MockPeer};
    use loom_protocol::{AgentInfo, Message};
    use std::time::Duration;

    fn snapshot(agents: &[&str]) -> ProjectSnapshot {
        ProjectSnapshot {
            agents: agents
                .iter()
                .map(|name| {
                    (
                        name.to_string(),
                        AgentInfo {
                            name: name.to_string(),
                            ..Default::default()
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    struct Fixture {
        studio: Studio,
        connector: MockConnector,
        snapshots: Arc<MockSnapshots>,
        probe: Arc<MockProbe>,
        store: Arc<MemoryStore>,
    }

    fn fixture(config: StudioConfig, agents: &[&str]) -> Fixture {
        let connector = MockConnector::new();
        let snapshots = Arc::new(MockSnapshots::new(snapshot(agents)));
        let probe = MockProbe::up();
        let store = Arc::new(MemoryStore::new());
        let studio = Studio::with_parts(
            config,
            Arc::new(connector.clone()),
            probe.clone(),
            snapshots.clone(),
            store.clone(),
        )
        .unwrap();
        Fixture {
            studio,
            connector,
            snapshots,
            probe,
            store,
        }
    }

    /// Pull updates until one matches
    async fn until(
        studio: &mut Studio,
        mut pred: impl FnMut(&StudioUpdate) -> bool,
    ) -> StudioUpdate {
        loop {
            let update = studio.next_update().await.expect("studio ended");
            if pred(&update) {
                return update;
            }
        }
    }

    async fn connected(f: &mut Fixture, path: &str) -> MockPeer {
        f.studio.chat.handle.wait_for(ChannelState::Open).await;
        f.connector.take_peer_for(path).unwrap()
    }

    fn non_empty_transcript(update: &StudioUpdate) -> bool {
        matches!(update, StudioUpdate::Transcript(t) if !t.is_empty())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_snapshot_selects_first_agent() {
        let mut f = fixture(StudioConfig::default(), &["alpha", "beta"]);
        let update = until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        assert_eq!(update, StudioUpdate::AgentSelected("alpha".into()));
        assert_eq!(f.studio.active_agent(), Some("alpha"));
        assert_eq!(f.snapshots.fetches(), 1);
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_default_agent_wins() {
        let config = StudioConfig {
            default_agent: Some("beta".into()),
            ..Default::default()
        };
        let mut f = fixture(config, &["alpha", "beta"]);
        until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        assert_eq!(f.studio.active_agent(), Some("beta"));
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_streamed_reply_builds_transcript() {
        let mut f = fixture(StudioConfig::default(), &["main"]);
        until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        let peer = connected(&mut f, "/ws/chat").await;

        assert!(f.studio.send("hi", Vec::new()));
        for frame in [
            r#"{"type":"token","data":"Hel"}"#,
            r#"{"type":"token","data":"lo"}"#,
            r#"{"type":"done","response_id":"resp_1"}"#,
        ] {
            peer.frames.send(Ok(frame.to_string())).unwrap();
        }
        until(&mut f.studio, |u| {
            matches!(u, StudioUpdate::Transcript(t) if t.last() == Some(&Message::assistant("Hello")))
        })
        .await;
        // `done` changes nothing visible, so poll with a timeout.
        for _ in 0..5 {
            if f.studio.response_id().is_some() {
                break;
            }
            let _ = tokio::time::timeout(Duration::from_millis(50), f.studio.next_update()).await;
        }

        assert_eq!(
            f.studio.transcript().messages(),
            &[Message::user("hi"), Message::assistant("Hello")]
        );
        assert_eq!(f.studio.response_id(), Some("resp_1"));
        assert_eq!(
            peer.sent.lock()[0],
            r#"{"message":"hi","agent_name":"main"}"#
        );
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_is_dropped() {
        let mut f = fixture(StudioConfig::default(), &["main"]);
        until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        let peer = connected(&mut f, "/ws/chat").await;

        peer.frames.send(Ok("not json".to_string())).unwrap();
        peer.frames.send(Ok(r#"[1,2]"#.to_string())).unwrap();
        peer.frames
            .send(Ok(r#"{"type":"token","data":"ok"}"#.to_string()))
            .unwrap();
        let update = until(&mut f.studio, non_empty_transcript).await;
        let StudioUpdate::Transcript(transcript) = update else {
            unreachable!();
        };
        assert_eq!(transcript.messages(), &[Message::assistant("ok")]);
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_disconnected_is_dropped() {
        let mut f = fixture(StudioConfig::default(), &["main"]);
        *f.connector.refuse.lock() = true;
        f.studio.chat.handle.wait_for(ChannelState::Closed).await;

        f.studio.select_agent("main");
        assert!(!f.studio.send("hello?", Vec::new()));
        assert!(f.studio.transcript().is_empty());
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_without_agent_removes_it() {
        let mut f = fixture(StudioConfig::default(), &["main", "other"]);
        until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        let _chat = connected(&mut f, "/ws/chat").await;
        assert!(f.studio.send("hi", Vec::new()));

        let reload = f.connector.take_peer_for("/ws/reload").unwrap();
        let frame = serde_json::json!({
            "type": "reload",
            "snapshot": {"agents": {"other": {"name": "other"}}, "tools": {}, "config": {}}
        });
        reload.frames.send(Ok(frame.to_string())).unwrap();

        let update = until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentRemoved(_))).await;
        assert_eq!(update, StudioUpdate::AgentRemoved("main".into()));
        assert!(f.studio.active_agent().is_none());
        assert!(f.studio.transcript().is_empty());
        assert!(f.store.is_empty());
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_refetches_snapshot() {
        let mut f = fixture(StudioConfig::default(), &["main"]);
        until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        assert_eq!(f.snapshots.fetches(), 1);

        *f.snapshots.snapshot.lock() = snapshot(&["main", "added"]);
        drop(f.connector.take_peer_for("/ws/reload"));
        until(&mut f.studio, |u| {
            matches!(u, StudioUpdate::Snapshot(s) if s.has_agent("added"))
        })
        .await;
        assert_eq!(f.snapshots.fetches(), 2);
        assert_eq!(f.studio.active_agent(), Some("main"));
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_down_goes_offline() {
        let mut f = fixture(StudioConfig::default(), &["main"]);
        let _chat = connected(&mut f, "/ws/chat").await;
        f.probe.set_down(true);
        *f.connector.refuse.lock() = true;
        drop(f.connector.take_peer_for("/ws/reload"));

        until(&mut f.studio, |u| *u == StudioUpdate::Online(false)).await;
        assert!(!f.studio.is_online());

        f.probe.set_down(false);
        *f.connector.refuse.lock() = false;
        until(&mut f.studio, |u| *u == StudioUpdate::Online(true)).await;
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_assistant_permission_prompt() {
        let config = StudioConfig {
            assistant: true,
            default_agent: Some("main".into()),
            ..Default::default()
        };
        let mut f = fixture(config, &["main"]);
        assert_eq!(f.studio.chat_kind(), ChannelKind::Assistant);
        until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        let peer = connected(&mut f, "/ws/assistant").await;

        peer.frames
            .send(Ok(
                r#"{"type":"permission_request","data":{"tool":"Bash","command":"ls"}}"#.to_string(),
            ))
            .unwrap();
        let update = until(&mut f.studio, |u| matches!(u, StudioUpdate::Prompt(_))).await;
        assert!(matches!(update, StudioUpdate::Prompt(PendingPrompt::Permission(_))));

        assert!(f.studio.respond_permission(true));
        assert!(!f.studio.respond_permission(true));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            peer.sent.lock().as_slice(),
            [r#"{"type":"permission_response","allowed":true}"#]
        );
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_transcript() {
        let config = StudioConfig {
            assistant: true,
            ..Default::default()
        };
        let mut f = fixture(config, &["main"]);
        until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        let peer = connected(&mut f, "/ws/assistant").await;
        peer.frames
            .send(Ok(r#"{"type":"token","data":"partial"}"#.to_string()))
            .unwrap();
        until(&mut f.studio, non_empty_transcript).await;

        assert!(f.studio.cancel());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(peer.sent.lock().as_slice(), [r#"{"type":"cancel"}"#]);
        assert_eq!(f.studio.transcript().messages(), &[Message::assistant("partial")]);
        f.studio.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_not_sent_to_conversation_channel() {
        let mut f = fixture(StudioConfig::default(), &["main"]);
        until(&mut f.studio, |u| matches!(u, StudioUpdate::AgentSelected(_))).await;
        let peer = connected(&mut f, "/ws/chat").await;

        assert!(!f.studio.cancel());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(peer.sent.lock().is_empty());
        f.studio.shutdown().await;
    }
}
