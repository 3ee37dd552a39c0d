//! Per-agent transcript and continuation token persistence

use std::sync::Arc;

use loom_protocol::{ProjectSnapshot, Transcript};

use crate::error::Result;
use crate::storage::KeyValueStore;

/// Namespace of per-agent transcript keys
pub const MESSAGES_NAMESPACE: &str = "chat-messages";
/// Namespace of per-agent continuation token keys
pub const RESPONSE_ID_NAMESPACE: &str = "chat-response-id";
/// Transcript key used before conversations were scoped per agent
pub const LEGACY_MESSAGES_KEY: &str = "chat-messages";
/// Continuation token key used before conversations were scoped per agent
pub const LEGACY_RESPONSE_ID_KEY: &str = "chat-response-id";

/// Result of [`TranscriptStore::migrate_legacy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Migration {
    /// No legacy keys present
    NothingToMigrate,
    /// Snapshot has no agents; legacy keys kept for a later run
    NoAgents,
    /// Legacy data copied into this agent's keys, legacy keys removed
    Copied { agent: String },
    /// Agent already had scoped data; legacy keys removed without copying
    Skipped { agent: String },
}

/// Reads and writes transcripts and continuation tokens by agent name
#[derive(Clone)]
pub struct TranscriptStore {
    store: Arc<dyn KeyValueStore>,
}

impl TranscriptStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn messages_key(agent: &str) -> String {
        format!("{}-{}", MESSAGES_NAMESPACE, agent)
    }

    pub fn response_id_key(agent: &str) -> String {
        format!("{}-{}", RESPONSE_ID_NAMESPACE, agent)
    }

    /// Load an agent's transcript; missing or unreadable data is empty
    pub fn load(&self, agent: &str) -> Transcript {
        let Some(raw) = self.store.get(&Self::messages_key(agent)) else {
            return Transcript::new();
        };
        match serde_json::from_str(&raw) {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::warn!("Discarding unreadable transcript for agent {}: {}", agent, e);
                Transcript::new()
            }
        }
    }

    /// Persist an agent's transcript with attachment payloads removed
    pub fn save(&self, agent: &str, transcript: &Transcript) -> Result<()> {
        let content = serde_json::to_string(&transcript.for_storage())?;
        self.store.set(&Self::messages_key(agent), &content)
    }

    pub fn load_response_id(&self, agent: &str) -> Option<String> {
        self.store
            .get(&Self::response_id_key(agent))
            .filter(|id| !id.is_empty())
    }

    /// Persist the continuation token; `None` removes it
    pub fn save_response_id(&self, agent: &str, response_id: Option<&str>) -> Result<()> {
        let key = Self::response_id_key(agent);
        match response_id {
            Some(id) => self.store.set(&key, id),
            None => self.store.remove(&key),
        }
    }

    /// Whether anything is stored for this agent
    pub fn has_data(&self, agent: &str) -> bool {
        self.store.contains(&Self::messages_key(agent))
            || self.store.contains(&Self::response_id_key(agent))
    }

    /// Remove everything stored for this agent
    pub fn clear(&self, agent: &str) -> Result<()> {
        self.store.remove(&Self::messages_key(agent))?;
        self.store.remove(&Self::response_id_key(agent))
    }

    /// Move unscoped legacy data into the first agent of `snapshot`.
    ///
    /// Never overwrites an agent that already has scoped data. Once legacy
    /// keys are gone every later call is a no-op.
    pub fn migrate_legacy(&self, snapshot: &ProjectSnapshot) -> Result<Migration> {
        let legacy_messages = self.store.get(LEGACY_MESSAGES_KEY);
        let legacy_response_id = self.store.get(LEGACY_RESPONSE_ID_KEY);
        if legacy_messages.is_none() && legacy_response_id.is_none() {
            return Ok(Migration::NothingToMigrate);
        }

        let Some(agent) = snapshot.first_agent() else {
            return Ok(Migration::NoAgents);
        };

        let outcome = if self.has_data(agent) {
            tracing::info!("Agent {} already has a conversation, dropping legacy data", agent);
            Migration::Skipped {
                agent: agent.to_string(),
            }
        } else {
            if let Some(messages) = &legacy_messages {
                self.store.set(&Self::messages_key(agent), messages)?;
            }
            if let Some(id) = &legacy_response_id {
                self.store.set(&Self::response_id_key(agent), id)?;
            }
            tracing::info!("Migrated legacy conversation to agent {}", agent);
            Migration::Copied {
                agent: agent.to_string(),
            }
        };

        self.store.remove(LEGACY_MESSAGES_KEY)?;
        self.store.remove(LEGACY_RESPONSE_ID_KEY)?;
        Ok(outcome)
    }
}
