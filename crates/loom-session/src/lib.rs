//! loom-session: live conversation session engine
//!
//! This crate keeps resilient channels to the dev server, folds their events
//! into per-agent transcripts and persists those transcripts locally.

pub mod connection;
pub mod conversation;
pub mod error;
pub mod events;
pub mod handle;
pub mod liveness;
pub mod project;
pub mod scope;
pub mod storage;
pub mod studio;
pub mod transcript_store;
pub mod transport;

pub use connection::{Channel, ConnectionManager};
pub use conversation::{AgentSession, PendingPrompt};
pub use error::{Error, Result};
pub use events::{ChannelEvent, ChannelKind, ChannelState};
pub use handle::ChannelHandle;
pub use liveness::{HttpProbe, LivenessMonitor, LivenessProbe};
pub use project::{ProjectClient, SnapshotSource};
pub use scope::{ScopeState, SessionScope, SnapshotOutcome};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use studio::{Studio, StudioConfig, StudioUpdate};
pub use transcript_store::{Migration, TranscriptStore};
pub use transport::{Connection, Connector, ReconnectConfig, WebSocketConnector};
