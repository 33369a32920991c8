//! Wire frames
//!
//! Every frame is a JSON object with exactly one key naming the message type.
//! Inbound frames are externally tagged enums matched exhaustively; anything
//! outside the sealed set is an [`TelebusError::UnknownMessageType`] the
//! endpoint logs and drops.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, TelebusError};

use super::client::{ProducerKey, StatusEvent, StatusKind};
use super::panic::PanicFrame;
use super::{ConnectionId, ProducerRecord};

/// Extract the discriminant of a single-key frame object
fn frame_discriminant(value: &Value) -> Result<&str> {
    let object = value
        .as_object()
        .ok_or_else(|| TelebusError::MalformedFrame("frame is not an object".into()))?;

    if object.len() != 1 {
        return Err(TelebusError::MalformedFrame(format!(
            "frame must have exactly one key, got {}",
            object.len()
        )));
    }

    // len() == 1 checked above
    Ok(object.keys().next().map(String::as_str).unwrap_or_default())
}

fn parse_tagged<T: serde::de::DeserializeOwned>(
    text: &str,
    known_types: &[&str],
) -> Result<T> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| TelebusError::MalformedFrame(e.to_string()))?;

    let discriminant = frame_discriminant(&value)?;
    if !known_types.contains(&discriminant) {
        return Err(TelebusError::UnknownMessageType(discriminant.to_string()));
    }

    serde_json::from_value(value).map_err(|e| TelebusError::MalformedFrame(e.to_string()))
}

// ---------------------------------------------------------------------------
// Producer -> broker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LoginMessage {
    pub name: String,
    pub instance: String,
    pub hostname: String,
    pub pid: u32,
    #[serde(
        default,
        alias = "timestamp",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub when: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusMessage {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub text: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub when: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    pub channel: String,
    /// Target consumer port for a scoped delivery, absent for broadcast-only
    #[serde(default)]
    pub port: Option<ConnectionId>,
    pub event: Value,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub when: Option<DateTime<Utc>>,
}

/// Sealed set of frames a producer connection may send
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerFrame {
    Login(LoginMessage),
    Status(StatusMessage),
    Push(PushMessage),
}

impl ProducerFrame {
    const TYPES: &'static [&'static str] = &["login", "status", "push"];

    pub fn parse(text: &str) -> Result<Self> {
        parse_tagged(text, Self::TYPES)
    }

    /// Stamp a missing timestamp with receipt time
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        let when = match self {
            ProducerFrame::Login(m) => &mut m.when,
            ProducerFrame::Status(m) => &mut m.when,
            ProducerFrame::Push(m) => &mut m.when,
        };
        when.get_or_insert(now);
    }
}

// ---------------------------------------------------------------------------
// Consumer -> broker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeMessage {
    pub name: String,
    pub instance: String,
    pub channel: String,
}

impl SubscribeMessage {
    pub fn key(&self) -> ProducerKey {
        ProducerKey::new(self.name.clone(), self.instance.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandMessage {
    pub id: String,
    #[serde(alias = "targetIdentity")]
    pub target: ProducerKey,
    #[serde(default)]
    pub arguments: Value,
}

/// Sealed set of frames a consumer connection may send
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerFrame {
    Subscribe(SubscribeMessage),
    Unsubscribe {},
    Command(CommandMessage),
    Unpanic { id: u64 },
}

impl ConsumerFrame {
    const TYPES: &'static [&'static str] = &["subscribe", "unsubscribe", "command", "unpanic"];

    pub fn parse(text: &str) -> Result<Self> {
        parse_tagged(text, Self::TYPES)
    }
}

// ---------------------------------------------------------------------------
// Broker -> consumer
// ---------------------------------------------------------------------------

/// One event on a producer channel, as relayed to consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub channel: String,
    pub source: ProducerKey,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
    pub event: Value,
}

/// Hint that a targeted push landed on a channel, addressed to one port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelHint {
    pub channel: String,
    pub port: ConnectionId,
    pub source: ProducerKey,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
}

/// A live update carries one event; a replay snapshot carries the buffered
/// history as a chronological array.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UpdateDelivery {
    One(ChannelEvent),
    Many(Vec<ChannelEvent>),
}

/// Frames the broker sends to a consumer connection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerBound {
    Snapshot(BTreeMap<String, ProducerRecord>),
    Login(ProducerRecord),
    Status(StatusEvent),
    Update(UpdateDelivery),
    Panic(PanicFrame),
    #[serde(rename = "channelnotempty")]
    ChannelNotEmpty(ChannelHint),
}

// ---------------------------------------------------------------------------
// Broker -> producer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandHead {
    pub port: ConnectionId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub when: DateTime<Utc>,
}

/// Command forwarded to a producer, framed under the command's own id:
/// `{"<id>": {"head": {"port": N, "when": T}, "body": {...}}}`
#[derive(Debug, Clone)]
pub struct CommandFrame {
    pub id: String,
    pub head: CommandHead,
    pub body: Value,
}

impl Serialize for CommandFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Payload<'a> {
            head: &'a CommandHead,
            body: &'a Value,
        }

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &self.id,
            &Payload {
                head: &self.head,
                body: &self.body,
            },
        )?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ms(t: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(t).unwrap()
    }

    #[test]
    fn test_parse_login_with_timestamp_alias() {
        let frame = ProducerFrame::parse(
            r#"{"login":{"name":"monitor","instance":"1","hostname":"box","pid":42,"timestamp":1000}}"#,
        )
        .unwrap();

        match frame {
            ProducerFrame::Login(login) => {
                assert_eq!(login.name, "monitor");
                assert_eq!(login.instance, "1");
                assert_eq!(login.pid, 42);
                assert_eq!(login.when, Some(ms(1000)));
            }
            other => panic!("expected login frame, got {:?}", other),
        }
    }

    #[test]
    fn test_stamp_fills_missing_timestamp_only() {
        let mut frame = ProducerFrame::parse(
            r#"{"status":{"type":"warning","text":"slow"}}"#,
        )
        .unwrap();
        frame.stamp(ms(7000));

        match &frame {
            ProducerFrame::Status(status) => assert_eq!(status.when, Some(ms(7000))),
            other => panic!("expected status frame, got {:?}", other),
        }

        // An already-present timestamp is preserved
        frame.stamp(ms(9000));
        match frame {
            ProducerFrame::Status(status) => assert_eq!(status.when, Some(ms(7000))),
            other => panic!("expected status frame, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_push_with_port() {
        let frame = ProducerFrame::parse(
            r#"{"push":{"channel":"log","port":7,"event":{"text":"booted"}}}"#,
        )
        .unwrap();

        match frame {
            ProducerFrame::Push(push) => {
                assert_eq!(push.channel, "log");
                assert_eq!(push.port, Some(7));
                assert_eq!(push.event["text"], "booted");
            }
            other => panic!("expected push frame, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_discriminant_is_not_malformed() {
        let err = ProducerFrame::parse(r#"{"frobnicate":{}}"#).unwrap_err();
        assert!(matches!(err, TelebusError::UnknownMessageType(t) if t == "frobnicate"));

        let err = ProducerFrame::parse("not json at all").unwrap_err();
        assert!(matches!(err, TelebusError::MalformedFrame(_)));

        let err = ProducerFrame::parse(r#"{"login":{},"status":{}}"#).unwrap_err();
        assert!(matches!(err, TelebusError::MalformedFrame(_)));
    }

    #[test]
    fn test_parse_consumer_frames() {
        let frame =
            ConsumerFrame::parse(r#"{"subscribe":{"name":"monitor","instance":"1","channel":"log"}}"#)
                .unwrap();
        match frame {
            ConsumerFrame::Subscribe(sub) => {
                assert_eq!(sub.key(), ProducerKey::new("monitor", "1"));
                assert_eq!(sub.channel, "log");
            }
            other => panic!("expected subscribe frame, got {:?}", other),
        }

        assert!(matches!(
            ConsumerFrame::parse(r#"{"unsubscribe":{}}"#).unwrap(),
            ConsumerFrame::Unsubscribe {}
        ));

        assert!(matches!(
            ConsumerFrame::parse(r#"{"unpanic":{"id":3}}"#).unwrap(),
            ConsumerFrame::Unpanic { id: 3 }
        ));

        let frame = ConsumerFrame::parse(
            r#"{"command":{"id":"ping","target":{"name":"monitor","instance":"1"},"arguments":{"user":"ops"}}}"#,
        )
        .unwrap();
        match frame {
            ConsumerFrame::Command(cmd) => {
                assert_eq!(cmd.id, "ping");
                assert_eq!(cmd.target, ProducerKey::new("monitor", "1"));
            }
            other => panic!("expected command frame, got {:?}", other),
        }
    }

    #[test]
    fn test_update_delivery_wire_shapes() {
        let event = ChannelEvent {
            channel: "log".into(),
            source: ProducerKey::new("monitor", "1"),
            when: ms(1000),
            event: serde_json::json!({ "text": "booted" }),
        };

        let single = serde_json::to_value(ConsumerBound::Update(UpdateDelivery::One(
            event.clone(),
        )))
        .unwrap();
        assert_eq!(single["update"]["event"]["text"], "booted");
        assert_eq!(single["update"]["source"]["name"], "monitor");

        let many = serde_json::to_value(ConsumerBound::Update(UpdateDelivery::Many(vec![
            event.clone(),
            event,
        ])))
        .unwrap();
        assert!(many["update"].is_array());
        assert_eq!(many["update"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_consumer_bound_frame_keys() {
        let empty = serde_json::to_value(ConsumerBound::Panic(PanicFrame::none())).unwrap();
        assert_eq!(empty, serde_json::json!({ "panic": {} }));

        let hint = serde_json::to_value(ConsumerBound::ChannelNotEmpty(ChannelHint {
            channel: "log".into(),
            port: 7,
            source: ProducerKey::new("monitor", "1"),
            when: ms(1000),
        }))
        .unwrap();
        assert_eq!(hint["channelnotempty"]["port"], 7);
    }

    #[test]
    fn test_command_frame_keyed_by_command_id() {
        let frame = CommandFrame {
            id: "shutdown".into(),
            head: CommandHead {
                port: 7,
                when: ms(1000),
            },
            body: serde_json::json!({ "when": "0" }),
        };

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "shutdown": {
                    "head": { "port": 7, "when": 1000 },
                    "body": { "when": "0" }
                }
            })
        );
    }
}
