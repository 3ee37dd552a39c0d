//! Channel lifecycle: connect, reconnect with a fixed delay, teardown

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::events::{ChannelEvent, ChannelKind, ChannelState};
use crate::handle::ChannelHandle;
use crate::liveness::{LivenessMonitor, LivenessProbe};
use crate::transport::{Connection, Connector, ReconnectConfig, websocket_url};

/// A channel opened by [`ConnectionManager::open`]
pub struct Channel {
    pub handle: ChannelHandle,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl Channel {
    pub fn kind(&self) -> ChannelKind {
        self.handle.kind()
    }
}

/// Keeps one live connection per channel while mounted.
///
/// Dropping the manager unmounts it: pending reconnect timers are cancelled
/// and open transports are closed.
pub struct ConnectionManager {
    base_url: String,
    connector: Arc<dyn Connector>,
    config: ReconnectConfig,
    liveness: LivenessMonitor,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Mount the manager and start the liveness monitor
    pub fn mount(
        base_url: impl Into<String>,
        connector: Arc<dyn Connector>,
        probe: Arc<dyn LivenessProbe>,
        config: ReconnectConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (liveness, monitor_task) =
            LivenessMonitor::spawn(probe, config.status_poll_interval, cancel.child_token());

        Self {
            base_url: base_url.into(),
            connector,
            config,
            liveness,
            cancel,
            tasks: vec![monitor_task],
        }
    }

    /// Start connecting `kind` immediately and keep it connected
    pub fn open(&mut self, kind: ChannelKind) -> Result<Channel> {
        let url = websocket_url(&self.base_url, kind.path())?;
        let (state_tx, state_rx) = watch::channel(ChannelState::Idle);
        let (events_tx, events) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let worker = ChannelWorker {
            kind,
            url,
            connector: self.connector.clone(),
            config: self.config.clone(),
            liveness: self.liveness.clone(),
            state: state_tx,
            events: events_tx,
            outbound: outbound_rx,
            cancel: self.cancel.child_token(),
        };
        self.tasks.push(tokio::spawn(worker.run()));

        Ok(Channel {
            handle: ChannelHandle {
                kind,
                state: state_rx,
                outbound: outbound_tx,
            },
            events,
        })
    }

    /// Server reachability as seen by the liveness monitor
    pub fn online(&self) -> watch::Receiver<bool> {
        self.liveness.subscribe()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Tear everything down and wait for the tasks to finish
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State machine driving one channel
struct ChannelWorker {
    kind: ChannelKind,
    url: String,
    connector: Arc<dyn Connector>,
    config: ReconnectConfig,
    liveness: LivenessMonitor,
    state: watch::Sender<ChannelState>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl ChannelWorker {
    async fn run(mut self) {
        loop {
            self.state.send_replace(ChannelState::Connecting);

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                attempt = self.connector.connect(&self.url) => attempt,
            };

            match attempt {
                Ok(connection) => {
                    let unmounted = self.serve(connection).await;
                    if unmounted {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Connecting {} channel failed: {}", self.kind.name(), e);
                    self.state.send_replace(ChannelState::Closed);
                    self.liveness.check_now();
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.delay) => {}
            }
        }

        self.state.send_replace(ChannelState::Unmounted);
        tracing::debug!("{} channel unmounted", self.kind.name());
    }

    /// Pump frames until the connection closes. Returns true on unmount.
    async fn serve(&mut self, connection: Connection) -> bool {
        let Connection {
            mut sink,
            mut frames,
        } = connection;

        // Anything queued while the channel was down is stale.
        while self.outbound.try_recv().is_ok() {}

        self.state.send_replace(ChannelState::Open);
        tracing::info!("{} channel connected", self.kind.name());
        let _ = self.events.send(ChannelEvent::Connected);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!("Closing {} channel: {}", self.kind.name(), e);
                    }
                    return true;
                }
                frame = frames.next() => match frame {
                    Some(Ok(text)) => {
                        let _ = self.events.send(ChannelEvent::Frame(text));
                    }
                    Some(Err(e)) => {
                        tracing::warn!("{} channel error: {}", self.kind.name(), e);
                        break;
                    }
                    None => break,
                },
                Some(text) = self.outbound.recv() => {
                    if let Err(e) = sink.send(text).await {
                        tracing::warn!("Send on {} channel failed: {}", self.kind.name(), e);
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "{} channel closed, reconnecting in {:?}",
            self.kind.name(),
            self.config.delay
        );
        self.state.send_replace(ChannelState::Closed);
        let _ = self.events.send(ChannelEvent::Disconnected);
        self.liveness.check_now();
        false
    }
}
