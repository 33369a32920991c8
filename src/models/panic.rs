use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::client::ProducerKey;

/// One unresolved critical alert on the process-wide panic stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanicRecord {
    /// Monotonic id, never reused within a process lifetime
    pub id: u64,
    pub source: ProducerKey,
    pub text: String,
    /// Stack depth at the time this panic was pushed (1 = bottom)
    pub depth: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
}

/// Panic state as shown to consumers: the current stack top, or `{}` for none
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanicFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ProducerKey>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub when: Option<DateTime<Utc>>,
}

impl PanicFrame {
    /// The empty frame meaning "no unresolved panics"
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.id.is_none()
    }
}

impl From<&PanicRecord> for PanicFrame {
    fn from(record: &PanicRecord) -> Self {
        Self {
            id: Some(record.id),
            text: Some(record.text.clone()),
            depth: Some(record.depth),
            source: Some(record.source.clone()),
            when: Some(record.when),
        }
    }
}
