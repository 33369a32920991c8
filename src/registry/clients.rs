//! Client Registry
//!
//! Last known descriptor and status for every producer identity that ever
//! logged in. Entries survive reconnects and are never deleted, only flipped
//! to `offline`.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, TelebusError};
use crate::models::{ProducerKey, ProducerRecord, StatusRecord};

#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<ProducerKey, ProducerRecord>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the record for a producer identity
    pub fn upsert(&mut self, record: ProducerRecord) -> &ProducerRecord {
        match self.clients.entry(record.key()) {
            Entry::Occupied(mut entry) => {
                entry.insert(record);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(record),
        }
    }

    pub fn get(&self, key: &ProducerKey) -> Option<&ProducerRecord> {
        self.clients.get(key)
    }

    pub fn contains(&self, key: &ProducerKey) -> bool {
        self.clients.contains_key(key)
    }

    /// Overwrite the last known status of a registered identity
    pub fn set_status(&mut self, key: &ProducerKey, status: StatusRecord) -> Result<()> {
        let record = self
            .clients
            .get_mut(key)
            .ok_or_else(|| TelebusError::UnknownProducer(key.clone()))?;
        record.status = status;
        Ok(())
    }

    /// Full registry contents for a consumer's initial snapshot, keyed by
    /// `name.instance`
    pub fn snapshot(&self) -> BTreeMap<String, ProducerRecord> {
        self.clients
            .iter()
            .map(|(key, record)| (key.to_string(), record.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusKind;
    use chrono::{TimeZone, Utc};

    fn record(name: &str, instance: &str) -> ProducerRecord {
        ProducerRecord {
            name: name.into(),
            instance: instance.into(),
            hostname: "box".into(),
            pid: 42,
            commands: None,
            channels: None,
            status: StatusRecord::new(
                StatusKind::Info,
                "started",
                Utc.timestamp_millis_opt(0).unwrap(),
            ),
        }
    }

    #[test]
    fn test_upsert_and_snapshot() {
        let mut registry = ClientRegistry::new();
        registry.upsert(record("monitor", "1"));
        registry.upsert(record("monitor", "2"));
        registry.upsert(record("monitor", "1"));

        assert_eq!(registry.len(), 2);

        let snapshot = registry.snapshot();
        assert!(snapshot.contains_key("monitor.1"));
        assert!(snapshot.contains_key("monitor.2"));
    }

    #[test]
    fn test_set_status_requires_registration() {
        let mut registry = ClientRegistry::new();
        let key = ProducerKey::new("monitor", "1");
        let offline = StatusRecord::new(
            StatusKind::Offline,
            "killed",
            Utc.timestamp_millis_opt(0).unwrap(),
        );

        let err = registry.set_status(&key, offline.clone()).unwrap_err();
        assert!(matches!(err, TelebusError::UnknownProducer(_)));

        registry.upsert(record("monitor", "1"));
        registry.set_status(&key, offline).unwrap();
        assert_eq!(registry.get(&key).unwrap().status.kind, StatusKind::Offline);
        assert_eq!(registry.get(&key).unwrap().status.text, "killed");
    }
}
