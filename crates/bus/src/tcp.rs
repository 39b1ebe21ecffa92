use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};

use agora_domain::{Error, Result};
use agora_protocol::BusEnvelope;

use crate::{BusSubscription, MessageBus};

/// Wire frame between a [`TcpBus`] and the relay. The channel name scopes
/// one logical deployment; frames for other channels are dropped on read.
#[derive(Debug, Serialize, Deserialize)]
struct WireFrame {
    channel: String,
    envelope: BusEnvelope,
}

/// Networked bus: a client of the [`crate::relay::BusRelay`] broker,
/// speaking newline-delimited JSON over TCP.
///
/// `publish` never blocks the room: envelopes go through a bounded queue
/// and are dropped with a warning when the connection cannot keep up.
pub struct TcpBus {
    outbound: mpsc::Sender<BusEnvelope>,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<BusEnvelope>>>>,
}

impl TcpBus {
    pub async fn connect(addr: &str, channel: &str, queue_limit: usize) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Federation(format!("bus connect {addr}: {e}")))?;
        let framed = Framed::new(stream, LinesCodec::new());
        let (mut sink, mut lines) = framed.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<BusEnvelope>(queue_limit.max(1));
        let subscribers: Arc<Mutex<Vec<mpsc::Sender<BusEnvelope>>>> = Arc::default();

        // Writer task: drain the publish queue onto the wire.
        let write_channel = channel.to_string();
        tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let frame = WireFrame {
                    channel: write_channel.clone(),
                    envelope,
                };
                let line = match serde_json::to_string(&frame) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode bus frame");
                        continue;
                    }
                };
                if sink.send(line).await.is_err() {
                    tracing::warn!("bus connection closed, stopping publisher");
                    break;
                }
            }
        });

        // Reader task: fan relayed frames in to local subscribers.
        let subs = subscribers.clone();
        let read_channel = channel.to_string();
        tokio::spawn(async move {
            while let Some(next) = lines.next().await {
                let line = match next {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "bus read failed");
                        break;
                    }
                };
                let frame: WireFrame = match serde_json::from_str(&line) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(error = %e, "ignoring unparseable bus frame");
                        continue;
                    }
                };
                if frame.channel != read_channel {
                    continue;
                }
                subs.lock().retain(|tx| match tx.try_send(frame.envelope.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!("bus subscriber queue full, dropping envelope");
                        true
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
            }
        });

        Ok(Self {
            outbound: outbound_tx,
            subscribers,
        })
    }
}

impl MessageBus for TcpBus {
    fn publish(&self, envelope: BusEnvelope) -> Result<()> {
        match self.outbound.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Best-effort transport: drop rather than stall the room.
                tracing::warn!("bus publish queue full, dropping envelope");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::Federation("bus connection closed".into()))
            }
        }
    }

    fn subscribe(&self) -> BusSubscription {
        let (tx, rx) = mpsc::channel(1024);
        self.subscribers.lock().push(tx);
        BusSubscription::queue(rx)
    }
}
