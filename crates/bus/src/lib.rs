//! Federation transport: an abstract pub/sub bus carrying [`BusEnvelope`]s
//! between server nodes.
//!
//! Two implementations: [`LocalBus`] (in-process, `tokio::sync::broadcast`)
//! for single-process federation and tests, and [`TcpBus`], a client of the
//! [`relay::BusRelay`] broker speaking newline-delimited JSON.
//!
//! Delivery is best-effort with loopback: a publisher's own subscribers see
//! the message again, and rooms drop the echo by `server_id`. Publishing
//! never blocks the caller; full queues drop with a logged warning.

mod local;
pub mod relay;
mod tcp;

pub use local::LocalBus;
pub use tcp::TcpBus;

use agora_domain::Result;
use agora_protocol::BusEnvelope;

/// Abstract pub/sub transport.
pub trait MessageBus: Send + Sync {
    /// Enqueue an envelope for delivery to every subscriber on the channel.
    fn publish(&self, envelope: BusEnvelope) -> Result<()>;

    /// Open a subscription to all envelopes on the channel, own publishes
    /// included. Dropping the subscription unsubscribes.
    fn subscribe(&self) -> BusSubscription;
}

/// A live subscription handle.
pub struct BusSubscription {
    inner: SubscriptionInner,
}

enum SubscriptionInner {
    Broadcast(tokio::sync::broadcast::Receiver<BusEnvelope>),
    Queue(tokio::sync::mpsc::Receiver<BusEnvelope>),
}

impl BusSubscription {
    pub(crate) fn broadcast(rx: tokio::sync::broadcast::Receiver<BusEnvelope>) -> Self {
        Self {
            inner: SubscriptionInner::Broadcast(rx),
        }
    }

    pub(crate) fn queue(rx: tokio::sync::mpsc::Receiver<BusEnvelope>) -> Self {
        Self {
            inner: SubscriptionInner::Queue(rx),
        }
    }

    /// Receive the next envelope; `None` once the bus is gone.
    ///
    /// A slow subscriber may lose envelopes rather than stall the bus;
    /// losses are logged and skipped.
    pub async fn recv(&mut self) -> Option<BusEnvelope> {
        match &mut self.inner {
            SubscriptionInner::Broadcast(rx) => loop {
                use tokio::sync::broadcast::error::RecvError;
                match rx.recv().await {
                    Ok(envelope) => return Some(envelope),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "bus subscriber lagged, dropping envelopes");
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
            SubscriptionInner::Queue(rx) => rx.recv().await,
        }
    }
}
