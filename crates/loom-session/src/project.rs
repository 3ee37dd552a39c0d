//! REST access to the project snapshot

use async_trait::async_trait;
use loom_protocol::ProjectSnapshot;

use crate::error::{Error, Result};

/// Path of the project snapshot endpoint
pub const PROJECT_PATH: &str = "/api/project";

/// Where fresh project snapshots come from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<ProjectSnapshot>;
}

/// Fetches project snapshots from the dev server
#[derive(Clone)]
pub struct ProjectClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProjectClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn snapshot_url(&self) -> String {
        format!("{}{}", self.base_url, PROJECT_PATH)
    }
}

#[async_trait]
impl SnapshotSource for ProjectClient {
    /// GET the current project snapshot
    async fn fetch_snapshot(&self) -> Result<ProjectSnapshot> {
        let url = self.snapshot_url();
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves whatever snapshot the test last set
    #[derive(Default)]
    pub struct MockSnapshots {
        pub snapshot: Mutex<ProjectSnapshot>,
        fetches: AtomicUsize,
    }

    impl MockSnapshots {
        pub fn new(snapshot: ProjectSnapshot) -> Self {
            Self {
                snapshot: Mutex::new(snapshot),
                fetches: AtomicUsize::new(0),
            }
        }

        pub fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotSource for MockSnapshots {
        async fn fetch_snapshot(&self) -> Result<ProjectSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.snapshot.lock().clone())
        }
    }
}
