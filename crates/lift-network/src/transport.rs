//! UDP broadcast transport.
//!
//! Serializes outbound `WireMessage`s and sends one datagram per configured
//! broadcast address; decodes inbound datagrams and hands them to the
//! replication layer. Delivery is best effort in both directions:
//!
//! - failed sends are logged and forgotten, the next broadcast carries the
//!   same information;
//! - malformed datagrams are dropped at the boundary;
//! - an optional simulated loss rate drops outbound datagrams at random.

use std::net::SocketAddr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::wire::{WireMessage, MAX_DATAGRAM_SIZE};
use crate::NetworkError;

/// Configuration for the transport layer.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address the receive socket binds to.
    pub listen_addr: SocketAddr,
    /// Destinations of every outbound datagram.
    pub broadcast_addrs: Vec<SocketAddr>,
    /// Probability in `[0, 1)` of dropping an outbound datagram.
    pub simulated_loss: f64,
}

impl TransportConfig {
    pub fn new(listen_addr: SocketAddr, broadcast_addrs: Vec<SocketAddr>) -> Self {
        Self {
            listen_addr,
            broadcast_addrs,
            simulated_loss: 0.0,
        }
    }
}

pub struct UdpBroadcast {
    socket: UdpSocket,
    targets: Vec<SocketAddr>,
    loss: f64,
    rng: StdRng,
}

impl UdpBroadcast {
    /// Bind the socket and enable broadcast on it.
    pub async fn bind(config: TransportConfig) -> Result<Self, NetworkError> {
        if config.broadcast_addrs.is_empty() {
            return Err(NetworkError::Transport("no broadcast address".into()));
        }

        let socket = UdpSocket::bind(config.listen_addr).await?;
        socket.set_broadcast(true)?;
        tracing::info!(
            listen = %socket.local_addr()?,
            targets = ?config.broadcast_addrs,
            loss = config.simulated_loss,
            "UDP transport bound"
        );

        Ok(Self {
            socket,
            targets: config.broadcast_addrs,
            loss: config.simulated_loss.clamp(0.0, 1.0),
            rng: StdRng::from_entropy(),
        })
    }

    /// Replace the loss generator, making simulated loss reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(self.socket.local_addr()?)
    }

    /// Pump datagrams until the outbound queue closes.
    pub async fn run(
        mut self,
        mut outbound: mpsc::Receiver<WireMessage>,
        inbound: mpsc::Sender<WireMessage>,
    ) -> Result<(), NetworkError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                msg = outbound.recv() => {
                    let Some(msg) = msg else { break };
                    self.send(&msg).await;
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (len, from) = match received {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(error = %e, "UDP receive failed");
                            continue;
                        }
                    };
                    match WireMessage::decode(&buf[..len]) {
                        Ok(msg) => inbound
                            .send(msg)
                            .await
                            .map_err(|_| NetworkError::ChannelClosed("inbound"))?,
                        Err(e) => {
                            tracing::debug!(from = %from, len, error = %e, "Dropped malformed datagram");
                        }
                    }
                }
            }
        }

        tracing::info!("UDP transport stopped");
        Ok(())
    }

    async fn send(&mut self, msg: &WireMessage) {
        let bytes = match msg.encode() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode broadcast");
                return;
            }
        };

        for target in &self.targets {
            if self.loss > 0.0 && self.rng.gen_bool(self.loss) {
                tracing::trace!(target = %target, "Simulated loss dropped broadcast");
                continue;
            }
            match self.socket.send_to(&bytes, target).await {
                Ok(_) => tracing::trace!(target = %target, len = bytes.len(), "Broadcast sent"),
                Err(e) => tracing::warn!(target = %target, error = %e, "Broadcast send failed"),
            }
        }
    }
}
