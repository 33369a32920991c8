//! Channel Registry
//!
//! One broadcast topic per declared channel of each producer identity,
//! materialized at first-ever login and reused across reconnects so replay
//! history survives. Targeted deliveries go to per-port scoped sub-topics
//! that live only as long as the requesting consumer connection.

use std::collections::{HashMap, HashSet};

use crate::bus::{EventBus, Handler, SubscriptionHandle};
use crate::catalog::ChannelSpec;
use crate::error::{Result, TelebusError};
use crate::models::{ChannelEvent, ConnectionId, ProducerKey};

/// Structured address of one channel topic, optionally scoped to a port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelAddress {
    pub producer: ProducerKey,
    pub channel: String,
    pub scope: Option<ConnectionId>,
}

impl ChannelAddress {
    pub fn broadcast(producer: ProducerKey, channel: impl Into<String>) -> Self {
        Self {
            producer,
            channel: channel.into(),
            scope: None,
        }
    }

    pub fn scoped(producer: ProducerKey, channel: impl Into<String>, port: ConnectionId) -> Self {
        Self {
            producer,
            channel: channel.into(),
            scope: Some(port),
        }
    }
}

/// Scoped sub-topics keep a single replay slot so a targeted reply is still
/// there when the requesting consumer (re)subscribes moments later.
const SCOPED_REPLAY_DEPTH: usize = 1;

pub struct ChannelRegistry {
    bus: EventBus<ChannelAddress, ChannelEvent>,
    declared: HashMap<ProducerKey, HashMap<String, usize>>,
    /// Every scoped sub-topic ever addressed to a port, for wholesale
    /// reclamation when that consumer disconnects. Ports are never reused.
    scoped_by_port: HashMap<ConnectionId, HashSet<ChannelAddress>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            bus: EventBus::new(),
            declared: HashMap::new(),
            scoped_by_port: HashMap::new(),
        }
    }

    /// Create the channel topics for an identity on its first-ever login.
    /// Reconnect logins find the entry present and keep the existing buses.
    pub fn materialize(&mut self, key: &ProducerKey, specs: &[ChannelSpec]) {
        if self.declared.contains_key(key) {
            return;
        }

        let mut channels = HashMap::new();
        for spec in specs {
            self.bus.open_topic(
                ChannelAddress::broadcast(key.clone(), spec.name.clone()),
                spec.replay_depth,
            );
            channels.insert(spec.name.clone(), spec.replay_depth);
        }
        self.declared.insert(key.clone(), channels);
    }

    pub fn is_materialized(&self, key: &ProducerKey) -> bool {
        self.declared.contains_key(key)
    }

    pub fn has_channel(&self, key: &ProducerKey, channel: &str) -> bool {
        self.declared
            .get(key)
            .is_some_and(|channels| channels.contains_key(channel))
    }

    fn require_channel(&self, key: &ProducerKey, channel: &str) -> Result<()> {
        if self.has_channel(key, channel) {
            Ok(())
        } else {
            Err(TelebusError::UnknownChannel {
                producer: key.clone(),
                channel: channel.to_string(),
            })
        }
    }

    /// Publish an event on a channel's broadcast topic
    pub fn publish(&mut self, key: &ProducerKey, channel: &str, event: ChannelEvent) -> Result<()> {
        self.require_channel(key, channel)?;
        self.bus
            .publish(&ChannelAddress::broadcast(key.clone(), channel), event);
        Ok(())
    }

    /// Publish an event on the scoped sub-topic of one consumer port
    pub fn publish_scoped(
        &mut self,
        key: &ProducerKey,
        channel: &str,
        port: ConnectionId,
        event: ChannelEvent,
    ) -> Result<()> {
        self.require_channel(key, channel)?;

        let address = ChannelAddress::scoped(key.clone(), channel, port);
        self.scoped_by_port
            .entry(port)
            .or_default()
            .insert(address.clone());
        self.bus.open_scoped_topic(address.clone(), SCOPED_REPLAY_DEPTH);
        self.bus.publish(&address, event);
        Ok(())
    }

    /// Subscribe to a channel's broadcast topic with snapshot replay
    pub fn subscribe(
        &mut self,
        key: &ProducerKey,
        channel: &str,
        want_snapshot: bool,
        handler: Handler<ChannelEvent>,
    ) -> Result<SubscriptionHandle<ChannelAddress>> {
        self.require_channel(key, channel)?;
        Ok(self.bus.subscribe(
            ChannelAddress::broadcast(key.clone(), channel),
            want_snapshot,
            handler,
        ))
    }

    /// Subscribe to the scoped sub-topic addressed to `port`
    pub fn subscribe_scoped(
        &mut self,
        key: &ProducerKey,
        channel: &str,
        port: ConnectionId,
        handler: Handler<ChannelEvent>,
    ) -> Result<SubscriptionHandle<ChannelAddress>> {
        self.require_channel(key, channel)?;

        let address = ChannelAddress::scoped(key.clone(), channel, port);
        self.scoped_by_port
            .entry(port)
            .or_default()
            .insert(address.clone());
        self.bus.open_scoped_topic(address.clone(), SCOPED_REPLAY_DEPTH);
        Ok(self.bus.subscribe(address, false, handler))
    }

    /// Release a subscription; purging discards a scoped topic's history
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle<ChannelAddress>, purge: bool) {
        self.bus.unsubscribe(handle, purge);
    }

    /// Drop every scoped sub-topic addressed to `port`, subscribed or not.
    /// A targeted push may have opened a slot the consumer never attached to.
    pub fn purge_port(&mut self, port: ConnectionId) {
        let Some(addresses) = self.scoped_by_port.remove(&port) else {
            return;
        };
        for address in addresses {
            self.bus.purge_scoped(&address);
        }
    }

    #[cfg(test)]
    pub(crate) fn has_scoped_topic(
        &self,
        key: &ProducerKey,
        channel: &str,
        port: ConnectionId,
    ) -> bool {
        self.bus
            .has_topic(&ChannelAddress::scoped(key.clone(), channel, port))
    }

    #[cfg(test)]
    fn history_len(&self, address: &ChannelAddress) -> usize {
        self.bus.history_len(address)
    }
}
