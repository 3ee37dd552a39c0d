//! A cloneable handle for sending on a channel from external code.

use loom_protocol::ClientFrame;
use tokio::sync::{mpsc, watch};

use crate::events::{ChannelKind, ChannelState};

/// A cloneable handle for sending on a channel.
///
/// Frames go through the channel's task, which writes them to whatever
/// connection is live at that moment. The handle never holds a socket.
#[derive(Clone)]
pub struct ChannelHandle {
    pub(crate) kind: ChannelKind,
    pub(crate) state: watch::Receiver<ChannelState>,
    pub(crate) outbound: mpsc::UnboundedSender<String>,
}

impl ChannelHandle {
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Send a frame if the channel is open.
    ///
    /// Returns whether the frame was queued. Frames offered while the channel
    /// is not open are dropped.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        if !self.is_open() {
            tracing::debug!("Dropping frame on {} channel: not connected", self.kind.name());
            return false;
        }
        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to encode frame: {}", e);
                return false;
            }
        };
        self.outbound.send(text).is_ok()
    }

    /// Wait until the channel reaches `target`.
    ///
    /// Returns `false` if the channel task ended first.
    pub async fn wait_for(&self, target: ChannelState) -> bool {
        let mut state = self.state.clone();
        state.wait_for(|s| *s == target).await.is_ok()
    }
}
