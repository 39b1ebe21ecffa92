//! Bridge from the federation bus into local rooms.
//!
//! One subscription per server instance: envelopes are routed to their
//! room by the payload's room id, and the room applies echo and
//! duplicate suppression. Only MESSAGE payloads cross the boundary —
//! membership events stay server-local because cross-server fan-out of
//! liveness is out of scope.

use std::sync::Arc;

use tokio::task::JoinHandle;

use agora_bus::MessageBus;
use agora_protocol::ServerEvent;

use crate::rooms::RoomManager;

/// Subscribe to the bus and route envelopes until aborted. Aborting the
/// returned handle drops the subscription.
pub fn spawn(bus: Arc<dyn MessageBus>, rooms: Arc<RoomManager>) -> JoinHandle<()> {
    let mut subscription = bus.subscribe();
    tokio::spawn(async move {
        while let Some(envelope) = subscription.recv().await {
            let room_id = match &envelope.payload {
                ServerEvent::Message { room_id, .. } => room_id.clone(),
                other => {
                    tracing::debug!(kind = other.kind(), "ignoring non-message bus payload");
                    continue;
                }
            };
            match rooms.get(&room_id) {
                Some(room) => room.handle_bus(envelope).await,
                None => {
                    tracing::debug!(room = %room_id, "bus message for unknown room dropped");
                }
            }
        }
        tracing::info!("bus subscription ended");
    })
}
