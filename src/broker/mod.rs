//! Broker actor
//!
//! One task owns every piece of shared state: the client and channel
//! registries, the panic stack, the control and command buses, and the
//! per-connection sessions. All mutation flows through a single mpsc inbox,
//! so message handling is strictly serialized and a publish drives every
//! subscriber callback before the next event is looked at. Handlers only
//! enqueue outbound frames on per-connection channels; they never block.

mod consumer;
mod producer;

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Handler, SubscriptionHandle};
use crate::catalog::Catalog;
use crate::error::{Result, TelebusError};
use crate::models::{
    ChannelEvent, CommandEnvelope, CommandFrame, ConnectionId, ConsumerBound, ConsumerFrame,
    PanicFrame, ProducerFrame, ProducerKey, ProducerRecord, StatusEvent,
};
use crate::registry::{ChannelAddress, ChannelRegistry, ClientRegistry, PanicStack};

/// Topics on the control bus every consumer listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlTopic {
    /// Producer logins
    Lifecycle,
    /// Status changes, including synthesized offline
    Status,
    /// Panic stack top changes
    Panics,
}

/// Events carried on the control bus
#[derive(Debug, Clone)]
pub enum ControlEvent {
    Login(ProducerRecord),
    Status(StatusEvent),
    Panic(PanicFrame),
}

/// The shared command bus has a single topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandTopic;

/// Everything the broker reacts to, delivered over its inbox
#[derive(Debug)]
pub enum BrokerEvent {
    ProducerConnected {
        port: ConnectionId,
        outbound: mpsc::UnboundedSender<CommandFrame>,
    },
    ProducerFrame {
        port: ConnectionId,
        frame: ProducerFrame,
    },
    ProducerClosed {
        port: ConnectionId,
        reason: String,
    },
    ConsumerConnected {
        port: ConnectionId,
        outbound: mpsc::UnboundedSender<ConsumerBound>,
    },
    ConsumerFrame {
        port: ConnectionId,
        frame: ConsumerFrame,
    },
    ConsumerClosed {
        port: ConnectionId,
    },
}

/// Cloneable sender half used by connection endpoints
#[derive(Clone)]
pub struct BrokerHandle {
    tx: mpsc::UnboundedSender<BrokerEvent>,
}

impl BrokerHandle {
    pub fn send(&self, event: BrokerEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| TelebusError::BrokerGone)
    }
}

pub(crate) struct ProducerSession {
    pub outbound: mpsc::UnboundedSender<CommandFrame>,
    pub identity: Option<ProducerKey>,
    pub command_sub: Option<SubscriptionHandle<CommandTopic>>,
}

pub(crate) struct ActiveSubscription {
    pub producer: ProducerKey,
    pub channel: String,
    pub broadcast: SubscriptionHandle<ChannelAddress>,
    pub scoped: SubscriptionHandle<ChannelAddress>,
}

pub(crate) struct ConsumerSession {
    pub outbound: mpsc::UnboundedSender<ConsumerBound>,
    pub control_subs: Vec<SubscriptionHandle<ControlTopic>>,
    pub active: Option<ActiveSubscription>,
}

/// The in-memory relay between producer and consumer connections
pub struct Broker {
    catalog: Catalog,
    pub(crate) clients: ClientRegistry,
    pub(crate) channels: ChannelRegistry,
    pub(crate) panics: PanicStack,
    pub(crate) control: EventBus<ControlTopic, ControlEvent>,
    pub(crate) commands: EventBus<CommandTopic, CommandEnvelope>,
    pub(crate) producers: HashMap<ConnectionId, ProducerSession>,
    pub(crate) consumers: HashMap<ConnectionId, ConsumerSession>,
}

impl Broker {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            clients: ClientRegistry::new(),
            channels: ChannelRegistry::new(),
            panics: PanicStack::new(),
            control: EventBus::new(),
            commands: EventBus::new(),
            producers: HashMap::new(),
            consumers: HashMap::new(),
        }
    }

    /// Spawn the broker task and return the handle endpoints talk to
    pub fn spawn(catalog: Catalog) -> BrokerHandle {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut broker = Broker::new(catalog);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                broker.dispatch(event);
            }
            info!("Broker inbox closed, shutting down");
        });

        BrokerHandle { tx }
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Handle one inbox event. Failures from the droppable part of the error
    /// taxonomy are logged here and never tear anything down.
    pub fn dispatch(&mut self, event: BrokerEvent) {
        let result = match event {
            BrokerEvent::ProducerConnected { port, outbound } => {
                debug!(port, "producer connected");
                self.producers.insert(
                    port,
                    ProducerSession {
                        outbound,
                        identity: None,
                        command_sub: None,
                    },
                );
                Ok(())
            }
            BrokerEvent::ProducerFrame { port, frame } => self.handle_producer_frame(port, frame),
            BrokerEvent::ProducerClosed { port, reason } => {
                self.finalize_producer(port, &reason);
                Ok(())
            }
            BrokerEvent::ConsumerConnected { port, outbound } => {
                self.attach_consumer(port, outbound);
                Ok(())
            }
            BrokerEvent::ConsumerFrame { port, frame } => self.handle_consumer_frame(port, frame),
            BrokerEvent::ConsumerClosed { port } => {
                self.finalize_consumer(port);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("dropped message: {}", e);
        }
    }
}

/// Forward control-bus events to one consumer connection, framed by kind
pub(crate) fn control_forwarder(
    sender: mpsc::UnboundedSender<ConsumerBound>,
) -> Handler<ControlEvent> {
    Box::new(move |events| {
        for event in events {
            let frame = match event {
                ControlEvent::Login(record) => ConsumerBound::Login(record.clone()),
                ControlEvent::Status(status) => ConsumerBound::Status(status.clone()),
                ControlEvent::Panic(panic) => ConsumerBound::Panic(panic.clone()),
            };
            // Send failures mean the connection is going away; its Closed
            // event will clean up.
            let _ = sender.send(frame);
        }
    })
}

/// Forward channel events to one consumer connection. A replay batch becomes
/// a single chronological `update` array, a live event a single object.
pub(crate) fn update_forwarder(
    sender: mpsc::UnboundedSender<ConsumerBound>,
) -> Handler<ChannelEvent> {
    use crate::models::UpdateDelivery;

    Box::new(move |events| {
        let delivery = match events {
            [single] => UpdateDelivery::One(single.clone()),
            batch => UpdateDelivery::Many(batch.to_vec()),
        };
        let _ = sender.send(ConsumerBound::Update(delivery));
    })
}
