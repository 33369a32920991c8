use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of one monitored producer process: `(name, instance)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProducerKey {
    pub name: String,
    pub instance: String,
}

impl ProducerKey {
    pub fn new(name: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: instance.into(),
        }
    }
}

impl std::fmt::Display for ProducerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.instance)
    }
}

/// Severity of a producer's reported condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Info,
    Warning,
    Alert,
    Offline,
    Panic,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Info => "info",
            StatusKind::Warning => "warning",
            StatusKind::Alert => "alert",
            StatusKind::Offline => "offline",
            StatusKind::Panic => "panic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(StatusKind::Info),
            "warning" | "warn" => Some(StatusKind::Warning),
            "alert" => Some(StatusKind::Alert),
            "offline" => Some(StatusKind::Offline),
            "panic" => Some(StatusKind::Panic),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A producer's last known condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(kind: StatusKind, text: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            kind,
            text: text.into(),
            when,
        }
    }
}

/// Registered producer: identity, origin, opaque descriptor and last status.
///
/// Registered on first login, kept across reconnects, never deleted (only
/// flipped to `offline`). `commands` and `channels` come from the descriptor
/// catalog and are forwarded verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerRecord {
    pub name: String,
    pub instance: String,
    pub hostname: String,
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Value>,
    pub status: StatusRecord,
}

impl ProducerRecord {
    pub fn key(&self) -> ProducerKey {
        ProducerKey::new(self.name.clone(), self.instance.clone())
    }
}

/// Status change broadcast to consumers, tagged with its source identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
    pub source: ProducerKey,
}
