//! Message relay: typed room messages over the transport's data primitive.
//!
//! Outbound messages are fire-and-forget. Inbound messages fan out to
//! subscriptions over a broadcast channel; each subscription runs its
//! handler on its own task and is released when dropped.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::{DataEnvelope, InboundMessage, RoomMessage, Targets};
use crate::transport::RoomTransport;

const INBOUND_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct MessageRelay {
    transport: Arc<dyn RoomTransport>,
    inbound: broadcast::Sender<InboundMessage>,
}

impl MessageRelay {
    pub fn new(transport: Arc<dyn RoomTransport>) -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        Self { transport, inbound }
    }

    pub fn local_peer_id(&self) -> String {
        self.transport.local_peer_id()
    }

    /// Send a message. No acknowledgement and no retry.
    pub async fn send(&self, to: &Targets, message: &RoomMessage) -> Result<()> {
        debug!(label = message.label(), to = ?to, "Sending room message");
        self.transport
            .send_data(to, message.label(), &message.payload())
            .await
    }

    /// Hand an inbound message to every live subscription.
    /// Returns how many subscriptions received it.
    pub fn deliver(&self, message: InboundMessage) -> usize {
        self.inbound.send(message).unwrap_or(0)
    }

    /// Decode a wire envelope and deliver it. Unknown labels and bad
    /// payloads are logged and dropped.
    pub fn deliver_envelope(&self, envelope: &DataEnvelope) -> usize {
        match envelope.decode() {
            Ok(message) => self.deliver(InboundMessage::new(envelope.from.clone(), message)),
            Err(e) => {
                warn!(from = %envelope.from, error = %e, "Dropping room message");
                0
            }
        }
    }

    /// Run `handler` for every inbound message accepted by `filter` until
    /// the returned [`Subscription`] is dropped.
    pub fn subscribe<F, H>(&self, filter: F, mut handler: H) -> Subscription
    where
        F: Fn(&InboundMessage) -> bool + Send + 'static,
        H: FnMut(InboundMessage) + Send + 'static,
    {
        let mut rx = self.inbound.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) if filter(&message) => handler(message),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Subscription lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { task }
    }
}

/// A live relay subscription. Dropping it stops the handler.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
