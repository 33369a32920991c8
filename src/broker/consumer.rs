//! Consumer Endpoint handlers
//!
//! A consumer connection watches the whole producer population and holds at
//! most one active channel subscription at a time. Commands it submits are
//! tagged with its port so the targeted reply finds its way back.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{
    CommandEnvelope, CommandMessage, ConnectionId, ConsumerBound, ConsumerFrame, PanicFrame,
    SubscribeMessage,
};

use super::{
    control_forwarder, update_forwarder, ActiveSubscription, Broker, CommandTopic, ConsumerSession,
    ControlEvent, ControlTopic,
};

impl Broker {
    /// Wire a new consumer into the control buses and send it the current
    /// world: top-of-stack panic (if any) and the full client registry.
    pub(crate) fn attach_consumer(
        &mut self,
        port: ConnectionId,
        outbound: mpsc::UnboundedSender<ConsumerBound>,
    ) {
        debug!(port, "consumer connected");

        let mut control_subs = vec![
            self.control.subscribe(
                ControlTopic::Lifecycle,
                false,
                control_forwarder(outbound.clone()),
            ),
            self.control.subscribe(
                ControlTopic::Status,
                false,
                control_forwarder(outbound.clone()),
            ),
        ];

        if let Some(top) = self.panics.top() {
            let _ = outbound.send(ConsumerBound::Panic(top.into()));
        }

        control_subs.push(self.control.subscribe(
            ControlTopic::Panics,
            false,
            control_forwarder(outbound.clone()),
        ));

        let _ = outbound.send(ConsumerBound::Snapshot(self.clients.snapshot()));

        self.consumers.insert(
            port,
            ConsumerSession {
                outbound,
                control_subs,
                active: None,
            },
        );
    }

    pub(crate) fn handle_consumer_frame(
        &mut self,
        port: ConnectionId,
        frame: ConsumerFrame,
    ) -> Result<()> {
        match frame {
            ConsumerFrame::Subscribe(subscribe) => self.consumer_subscribe(port, subscribe),
            ConsumerFrame::Unsubscribe {} => {
                self.consumer_unsubscribe(port);
                Ok(())
            }
            ConsumerFrame::Command(command) => {
                self.consumer_command(port, command);
                Ok(())
            }
            ConsumerFrame::Unpanic { id } => {
                self.consumer_unpanic(id);
                Ok(())
            }
        }
    }

    /// Switch the connection's single active channel subscription. The old
    /// pair, scoped sub-topic included, is fully released before the new one
    /// delivers anything.
    fn consumer_subscribe(&mut self, port: ConnectionId, subscribe: SubscribeMessage) -> Result<()> {
        let key = subscribe.key();

        let Some(session) = self.consumers.get(&port) else {
            debug!(port, "subscribe from unknown consumer");
            return Ok(());
        };

        if session
            .active
            .as_ref()
            .is_some_and(|active| active.producer == key && active.channel == subscribe.channel)
        {
            return Ok(());
        }

        let outbound = session.outbound.clone();
        self.consumer_unsubscribe(port);

        let broadcast =
            self.channels
                .subscribe(&key, &subscribe.channel, true, update_forwarder(outbound.clone()))?;
        let scoped = match self.channels.subscribe_scoped(
            &key,
            &subscribe.channel,
            port,
            update_forwarder(outbound),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                self.channels.unsubscribe(broadcast, false);
                return Err(e);
            }
        };

        if let Some(session) = self.consumers.get_mut(&port) {
            session.active = Some(ActiveSubscription {
                producer: key,
                channel: subscribe.channel,
                broadcast,
                scoped,
            });
        }
        Ok(())
    }

    /// Drop the active channel pair, purging this connection's scoped history
    fn consumer_unsubscribe(&mut self, port: ConnectionId) {
        let Some(active) = self
            .consumers
            .get_mut(&port)
            .and_then(|session| session.active.take())
        else {
            return;
        };

        self.channels.unsubscribe(active.broadcast, false);
        self.channels.unsubscribe(active.scoped, true);
    }

    /// Publish the command on the shared bus; only the producer endpoint
    /// whose identity matches the target will act on it.
    fn consumer_command(&mut self, port: ConnectionId, command: CommandMessage) {
        info!(port, command = %command.id, target = %command.target, "command submitted");

        self.commands.publish(
            &CommandTopic,
            CommandEnvelope {
                id: command.id,
                target: command.target,
                arguments: command.arguments,
                origin_port: port,
                when: Utc::now(),
            },
        );
    }

    /// Resolve the top-of-stack panic; every consumer sees the new top, or an
    /// empty panic state when the stack drains.
    fn consumer_unpanic(&mut self, id: u64) {
        if !self.panics.resolve(id) {
            return;
        }

        let frame = self.panics.top().map(PanicFrame::from).unwrap_or_default();
        self.control
            .publish(&ControlTopic::Panics, ControlEvent::Panic(frame));
    }

    /// Release everything this connection holds; idempotent against repeated
    /// close/error signals because the session is gone after the first.
    pub(crate) fn finalize_consumer(&mut self, port: ConnectionId) {
        self.consumer_unsubscribe(port);
        // Scoped slots opened by targeted pushes outside the active
        // subscription pair go with the port too.
        self.channels.purge_port(port);

        let Some(session) = self.consumers.remove(&port) else {
            return;
        };

        for handle in session.control_subs {
            self.control.unsubscribe(handle, false);
        }

        debug!(port, "consumer finalized");
    }
}
