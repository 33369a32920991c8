//! Descriptor catalog
//!
//! Externally supplied metadata describing each producer kind: its remote
//! commands and its channel definitions. The broker forwards both verbatim on
//! the producer record and never interprets them, with one exception: a
//! channel definition's `history` field sets that channel's replay depth.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{Result, TelebusError};

/// Catalog of command/channel descriptors, keyed by producer name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    commands: HashMap<String, Value>,
    #[serde(default)]
    channels: HashMap<String, Value>,
}

/// Replay depth and the full (opaque) definition of one declared channel
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: String,
    pub replay_depth: usize,
}

impl Catalog {
    /// An empty catalog; producers log in with no descriptor attached
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the catalog from a JSON file
    pub fn load(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TelebusError::CatalogLoad {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let catalog: Catalog =
            serde_json::from_str(&text).map_err(|e| TelebusError::CatalogLoad {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        info!(
            path,
            producers = catalog.commands.len().max(catalog.channels.len()),
            "Descriptor catalog loaded"
        );
        Ok(catalog)
    }

    /// Command descriptors for a producer name, forwarded unmodified
    pub fn commands_for(&self, name: &str) -> Option<Value> {
        self.commands.get(name).cloned()
    }

    /// Channel definitions for a producer name, forwarded unmodified
    pub fn channels_for(&self, name: &str) -> Option<Value> {
        self.channels.get(name).cloned()
    }

    /// Declared channels with their replay depths (`history`, default 0).
    ///
    /// This is the only field of the descriptor the broker reads.
    pub fn channel_specs(&self, name: &str) -> Vec<ChannelSpec> {
        let Some(Value::Object(channels)) = self.channels.get(name) else {
            return Vec::new();
        };

        channels
            .iter()
            .map(|(channel, definition)| ChannelSpec {
                name: channel.clone(),
                replay_depth: definition
                    .get("history")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Catalog {
        serde_json::from_value(json!({
            "commands": {
                "monitor": {
                    "ping": { "name": "ping process", "parameters": { "user": { "name": "User" } } }
                }
            },
            "channels": {
                "monitor": {
                    "log": { "history": 100 },
                    "table": { "columns": ["pid", "cpu"] }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_lookup_by_producer_name() {
        let catalog = sample();

        let commands = catalog.commands_for("monitor").unwrap();
        assert_eq!(commands["ping"]["name"], "ping process");

        assert!(catalog.commands_for("unknown").is_none());
        assert!(catalog.channels_for("unknown").is_none());
    }

    #[test]
    fn test_channel_specs_read_history_only() {
        let catalog = sample();
        let mut specs = catalog.channel_specs("monitor");
        specs.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "log");
        assert_eq!(specs[0].replay_depth, 100);
        assert_eq!(specs[1].name, "table");
        assert_eq!(specs[1].replay_depth, 0);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::empty();
        assert!(catalog.commands_for("monitor").is_none());
        assert!(catalog.channel_specs("monitor").is_empty());
    }
}
