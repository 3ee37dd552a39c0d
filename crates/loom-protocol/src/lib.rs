//! loom-protocol: conversation data model and wire protocol
//!
//! This crate defines the messages that make up a conversation transcript,
//! the JSON frames exchanged with the dev server, and the pure reducer that
//! folds incoming events into a transcript.

pub mod error;
pub mod events;
pub mod reducer;
pub mod snapshot;
pub mod transcript;
pub mod types;

pub use error::{Error, Result};
pub use events::{ChatRequest, ClientFrame, ControlFrame, ProjectEvent, ServerEvent};
pub use reducer::reduce;
pub use snapshot::{AgentInfo, ProjectSnapshot, ToolInfo};
pub use transcript::Transcript;
pub use types::*;
