//! Project snapshot as published by the dev server

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An agent discovered in the project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInfo {
    pub name: String,
    pub instructions: Option<String>,
    pub model: Option<String>,
    pub tools: Vec<String>,
    pub temperature: Option<f64>,
    pub reasoning_effort: Option<String>,
    pub source_file: Option<String>,
    pub project: Option<String>,
}

/// A tool discovered in the project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub parameters: serde_json::Value,
    pub source_file: Option<String>,
    pub project: Option<String>,
}

/// Everything the server currently knows about the project.
///
/// `agents` and `tools` arrive as JSON objects keyed by name. The order the
/// server lists them in is kept, so [`ProjectSnapshot::first_agent`] matches
/// the server's notion of the default agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSnapshot {
    #[serde(with = "ordered")]
    pub agents: Vec<(String, AgentInfo)>,
    #[serde(with = "ordered")]
    pub tools: Vec<(String, ToolInfo)>,
    pub config: serde_json::Value,
}

impl ProjectSnapshot {
    pub fn first_agent(&self) -> Option<&str> {
        self.agents.first().map(|(name, _)| name.as_str())
    }

    pub fn agent(&self, name: &str) -> Option<&AgentInfo> {
        self.agents
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, info)| info)
    }

    pub fn has_agent(&self, name: &str) -> bool {
        self.agent(name).is_some()
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|(name, _)| name.as_str())
    }

    pub fn tool(&self, name: &str) -> Option<&ToolInfo> {
        self.tools
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, info)| info)
    }

    /// Error string the server puts in `config` when discovery failed
    pub fn load_error(&self) -> Option<&str> {
        self.config.get("error").and_then(|v| v.as_str())
    }
}

/// (De)serialize a JSON object as an insertion-ordered list of entries
mod ordered {
    use super::*;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, V>(entries: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }

    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map keyed by name")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut entries: Vec<(String, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                // Later duplicates win, matching a JSON object's semantics.
                if let Some(slot) = entries.iter_mut().find(|entry| entry.0 == key) {
                    slot.1 = value;
                } else {
                    entries.push((key, value));
                }
            }
            Ok(entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_order_preserved() {
        let json = r#"{
            "agents": {
                "zeta": {"name": "zeta", "model": "gpt-5"},
                "alpha": {"name": "alpha", "tools": ["search"]}
            },
            "tools": {},
            "config": {}
        }"#;
        let snapshot: ProjectSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.first_agent(), Some("zeta"));
        assert_eq!(snapshot.agent_names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(snapshot.agent("alpha").unwrap().tools, vec!["search"]);
    }

    #[test]
    fn test_duplicate_agent_keeps_first_position_last_value() {
        let json = r#"{
            "agents": {
                "main": {"name": "main", "model": "old"},
                "other": {"name": "other"},
                "main": {"name": "main", "model": "new"}
            }
        }"#;
        let snapshot: ProjectSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.agent_names().collect::<Vec<_>>(), vec!["main", "other"]);
        assert_eq!(snapshot.agent("main").unwrap().model.as_deref(), Some("new"));
    }

    #[test]
    fn test_empty_object_is_empty_snapshot() {
        let snapshot: ProjectSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.agents.is_empty());
        assert_eq!(snapshot.first_agent(), None);
    }

    #[test]
    fn test_load_error_from_config() {
        let snapshot: ProjectSnapshot =
            serde_json::from_str(r#"{"config": {"error": "bad import"}}"#).unwrap();
        assert_eq!(snapshot.load_error(), Some("bad import"));
    }

    #[test]
    fn test_serializes_agents_as_object() {
        let snapshot = ProjectSnapshot {
            agents: vec![(
                "main".into(),
                AgentInfo {
                    name: "main".into(),
                    ..Default::default()
                },
            )],
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["agents"]["main"]["name"], "main");
    }
}
