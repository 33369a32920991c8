use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::ProducerKey;
use super::ConnectionId;

/// A command in flight on the shared command bus.
///
/// Created by a Consumer Endpoint, acted on only by the Producer Endpoint
/// whose identity matches `target`. `origin_port` addresses the reply back to
/// the submitting consumer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: String,
    pub target: ProducerKey,
    pub arguments: Value,
    pub origin_port: ConnectionId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_envelope_round_trip() {
        let envelope = CommandEnvelope {
            id: "ping".into(),
            target: ProducerKey::new("monitor", "1"),
            arguments: serde_json::json!({ "user": "ops" }),
            origin_port: 7,
            when: Utc.timestamp_millis_opt(5_000).unwrap(),
        };

        let json = serde_json::to_string(&envelope).unwrap();
        let back: CommandEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "ping");
        assert_eq!(back.target, envelope.target);
        assert_eq!(back.origin_port, 7);
    }
}
