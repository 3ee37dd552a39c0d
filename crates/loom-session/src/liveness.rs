//! Out-of-band server liveness checks
//!
//! A closed socket alone cannot tell a server restart from a dead server.
//! When a channel closes, the monitor probes a plain HTTP endpoint; if that
//! fails too, the application is offline until a later probe succeeds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Answers "is the server reachable right now"
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Probe that issues a GET and expects a 2xx answer
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Probe `path` under the server's base URL
    pub fn for_server(client: reqwest::Client, base_url: &str, path: &str) -> Self {
        Self::new(client, format!("{}{}", base_url.trim_end_matches('/'), path))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Liveness probe to {} failed: {}", self.url, e);
                false
            }
        }
    }
}

/// Handle to the background liveness task
#[derive(Clone)]
pub struct LivenessMonitor {
    trigger: Arc<Notify>,
    online: watch::Receiver<bool>,
}

impl LivenessMonitor {
    /// Start the monitor. The first probe runs immediately.
    pub fn spawn(
        probe: Arc<dyn LivenessProbe>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let trigger = Arc::new(Notify::new());
        let (online_tx, online) = watch::channel(true);

        trigger.notify_one();
        let task = tokio::spawn(run_monitor(
            probe,
            poll_interval,
            trigger.clone(),
            online_tx,
            cancel,
        ));

        (Self { trigger, online }, task)
    }

    /// Ask for a probe. Requests arriving while one is running coalesce.
    pub fn check_now(&self) {
        self.trigger.notify_one();
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.clone()
    }
}

async fn run_monitor(
    probe: Arc<dyn LivenessProbe>,
    poll_interval: Duration,
    trigger: Arc<Notify>,
    online: watch::Sender<bool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = trigger.notified() => {}
        }

        if probe.is_reachable().await {
            continue;
        }

        tracing::warn!("Server unreachable, polling until it responds");
        online.send_replace(false);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(poll_interval) => {}
            }
            if probe.is_reachable().await {
                break;
            }
        }

        tracing::info!("Server reachable again");
        online.send_replace(true);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Probe whose answer the test flips
    #[derive(Default)]
    pub struct MockProbe {
        pub down: AtomicBool,
        pub calls: AtomicUsize,
    }

    impl MockProbe {
        pub fn up() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LivenessProbe for MockProbe {
        async fn is_reachable(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            !self.down.load(Ordering::SeqCst)
        }
    }
}
