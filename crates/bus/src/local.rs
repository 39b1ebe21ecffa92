use agora_domain::Result;
use agora_protocol::BusEnvelope;
use tokio::sync::broadcast;

use crate::{BusSubscription, MessageBus};

/// In-process bus: clones share one broadcast channel, so several
/// `SessionServer`s in the same process federate through it.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<BusEnvelope>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MessageBus for LocalBus {
    fn publish(&self, envelope: BusEnvelope) -> Result<()> {
        // No subscribers is not an error; the envelope just evaporates.
        let _ = self.tx.send(envelope);
        Ok(())
    }

    fn subscribe(&self) -> BusSubscription {
        BusSubscription::broadcast(self.tx.subscribe())
    }
}
