//! Producer Endpoint handlers
//!
//! A producer connection logs in, then streams status updates and channel
//! pushes. Its endpoint owns the registry entries keyed by its identity and
//! holds the connection's command-bus subscription.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Result, TelebusError};
use crate::models::{
    ChannelEvent, ChannelHint, CommandFrame, CommandHead, ConnectionId, ConsumerBound,
    LoginMessage, PanicFrame, ProducerFrame, ProducerKey, ProducerRecord, PushMessage,
    StatusEvent, StatusKind, StatusMessage, StatusRecord,
};

use super::{Broker, CommandTopic, ControlEvent, ControlTopic};

/// Close without a reason is recorded as this status text
const DEFAULT_CLOSE_REASON: &str = "killed";

impl Broker {
    pub(crate) fn handle_producer_frame(
        &mut self,
        port: ConnectionId,
        frame: ProducerFrame,
    ) -> Result<()> {
        match frame {
            ProducerFrame::Login(login) => self.producer_login(port, login),
            ProducerFrame::Status(status) => self.producer_status(port, status),
            ProducerFrame::Push(push) => self.producer_push(port, push),
        }
    }

    /// Register identity and descriptor, materialize channel buses on
    /// first-ever login, then announce the login on the lifecycle bus.
    fn producer_login(&mut self, port: ConnectionId, login: LoginMessage) -> Result<()> {
        let key = ProducerKey::new(login.name.clone(), login.instance.clone());
        let when = login.when.unwrap_or_else(Utc::now);

        info!(producer = %key, hostname = %login.hostname, pid = login.pid, "producer login");

        let record = ProducerRecord {
            name: login.name,
            instance: login.instance,
            hostname: login.hostname,
            pid: login.pid,
            commands: self.catalog().commands_for(&key.name),
            channels: self.catalog().channels_for(&key.name),
            status: StatusRecord::new(StatusKind::Info, "started", when),
        };

        // A re-login under a different identity on the same socket releases
        // the stale command subscription first.
        let stale = {
            let session = self
                .producers
                .get_mut(&port)
                .ok_or(TelebusError::NotLoggedIn { port })?;
            let changed = session.identity.as_ref() != Some(&key);
            session.identity = Some(key.clone());
            if changed {
                session.command_sub.take()
            } else {
                None
            }
        };
        if let Some(handle) = stale {
            self.commands.unsubscribe(handle, false);
        }

        let outbound = self
            .producers
            .get(&port)
            .filter(|session| session.command_sub.is_none())
            .map(|session| session.outbound.clone());

        if let Some(outbound) = outbound {
            let identity = key.clone();
            let handle = self.commands.subscribe(
                CommandTopic,
                false,
                Box::new(move |envelopes| {
                    for envelope in envelopes {
                        // Only the targeted producer acts on a command
                        if envelope.target != identity {
                            continue;
                        }
                        let _ = outbound.send(CommandFrame {
                            id: envelope.id.clone(),
                            head: CommandHead {
                                port: envelope.origin_port,
                                when: envelope.when,
                            },
                            body: envelope.arguments.clone(),
                        });
                    }
                }),
            );
            if let Some(session) = self.producers.get_mut(&port) {
                session.command_sub = Some(handle);
            }
        }

        let specs = self.catalog().channel_specs(&key.name);
        self.channels.materialize(&key, &specs);

        let record = self.clients.upsert(record).clone();
        self.control
            .publish(&ControlTopic::Lifecycle, ControlEvent::Login(record));
        Ok(())
    }

    /// A `panic` status grows the panic stack; anything else overwrites the
    /// identity's last known condition and is broadcast to consumers.
    fn producer_status(&mut self, port: ConnectionId, status: StatusMessage) -> Result<()> {
        let key = self.producer_identity(port)?;
        let when = status.when.unwrap_or_else(Utc::now);

        if status.kind == StatusKind::Panic {
            let frame = PanicFrame::from(self.panics.push(key, status.text, when));
            self.control
                .publish(&ControlTopic::Panics, ControlEvent::Panic(frame));
            return Ok(());
        }

        self.clients
            .set_status(&key, StatusRecord::new(status.kind, status.text.clone(), when))?;

        self.control.publish(
            &ControlTopic::Status,
            ControlEvent::Status(StatusEvent {
                kind: status.kind,
                text: status.text,
                when,
                source: key,
            }),
        );
        Ok(())
    }

    /// Relay a channel push. The broadcast copy is always published; a push
    /// carrying a port additionally lands on that port's scoped sub-topic,
    /// and the addressed consumer gets a `channelnotempty` hint.
    fn producer_push(&mut self, port: ConnectionId, push: PushMessage) -> Result<()> {
        let key = self.producer_identity(port)?;
        let when = push.when.unwrap_or_else(Utc::now);

        let event = ChannelEvent {
            channel: push.channel.clone(),
            source: key.clone(),
            when,
            event: push.event,
        };

        self.channels.publish(&key, &push.channel, event.clone())?;

        if let Some(target_port) = push.port {
            // A scoped slot is only worth opening while its consumer lives;
            // the broadcast copy above already carried the event.
            let Some(outbound) = self
                .consumers
                .get(&target_port)
                .map(|consumer| consumer.outbound.clone())
            else {
                debug!(port = target_port, "targeted push for a gone consumer");
                return Ok(());
            };

            self.channels
                .publish_scoped(&key, &push.channel, target_port, event)?;

            let _ = outbound.send(ConsumerBound::ChannelNotEmpty(ChannelHint {
                channel: push.channel,
                port: target_port,
                source: key,
                when,
            }));
        }
        Ok(())
    }

    /// Transport close or error: synthesize a terminal `offline` status,
    /// broadcast it, and release the command-bus subscription. Runs at most
    /// once per connection; repeated close signals find no session.
    pub(crate) fn finalize_producer(&mut self, port: ConnectionId, reason: &str) {
        let Some(session) = self.producers.remove(&port) else {
            return;
        };

        if let Some(handle) = session.command_sub {
            self.commands.unsubscribe(handle, false);
        }

        let Some(key) = session.identity else {
            debug!(port, "producer closed before login");
            return;
        };

        let reason = if reason.is_empty() {
            DEFAULT_CLOSE_REASON
        } else {
            reason
        };
        let when = Utc::now();

        info!(producer = %key, reason, "producer offline");

        let status = StatusRecord::new(StatusKind::Offline, reason, when);
        if let Err(e) = self.clients.set_status(&key, status) {
            warn!("offline status for unregistered producer: {}", e);
            return;
        }

        self.control.publish(
            &ControlTopic::Status,
            ControlEvent::Status(StatusEvent {
                kind: StatusKind::Offline,
                text: reason.to_string(),
                when,
                source: key,
            }),
        );
    }

    fn producer_identity(&self, port: ConnectionId) -> Result<ProducerKey> {
        self.producers
            .get(&port)
            .and_then(|session| session.identity.clone())
            .ok_or(TelebusError::NotLoggedIn { port })
    }
}
