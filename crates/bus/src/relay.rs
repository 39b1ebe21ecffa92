//! Minimal fan-out broker for the TCP bus.
//!
//! Every line a peer sends is forwarded to every connected peer, the
//! sender included — publishers expect their own echo back and filter it
//! by server id. The relay never parses frames beyond line framing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};

use agora_domain::{Error, Result};

type PeerMap = Arc<Mutex<HashMap<u64, mpsc::Sender<String>>>>;

pub struct BusRelay {
    local_addr: SocketAddr,
    accept_task: tokio::task::JoinHandle<()>,
}

impl BusRelay {
    /// Bind and start accepting peers. Use port 0 for an ephemeral port.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Federation(format!("relay bind {addr}: {e}")))?;
        let local_addr = listener.local_addr().map_err(Error::Io)?;
        tracing::info!(addr = %local_addr, "bus relay listening");

        let peers: PeerMap = Arc::default();
        let accept_task = tokio::spawn(accept_loop(listener, peers));
        Ok(Self {
            local_addr,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for BusRelay {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, peers: PeerMap) {
    let mut next_id: u64 = 0;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                next_id += 1;
                tokio::spawn(handle_peer(stream, addr, next_id, peers.clone()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "relay accept failed");
            }
        }
    }
}

async fn handle_peer(stream: TcpStream, addr: SocketAddr, id: u64, peers: PeerMap) {
    let framed = Framed::new(stream, LinesCodec::new());
    let (mut sink, mut lines) = framed.split();

    let (tx, mut rx) = mpsc::channel::<String>(1024);
    peers.lock().insert(id, tx);
    tracing::debug!(peer = %addr, "bus peer connected");

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if sink.send(line).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(line)) = lines.next().await {
        let targets: Vec<_> = peers.lock().values().cloned().collect();
        for peer in targets {
            if let Err(mpsc::error::TrySendError::Full(_)) = peer.try_send(line.clone()) {
                tracing::warn!("relay peer queue full, dropping frame");
            }
        }
    }

    peers.lock().remove(&id);
    writer.abort();
    tracing::debug!(peer = %addr, "bus peer disconnected");
}
