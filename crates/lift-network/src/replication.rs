//! Anti-entropy replication.
//!
//! The replica keeps the outgoing registry current with every request the
//! request server resolves, and turns each inbound snapshot into:
//!
//! - a positive liveness signal for the sender,
//! - the sender's physical state for order assignment,
//! - one request update per cell that differs from the local registry.
//!
//! Remote snapshots are never merged directly. Their updates go through the
//! request server, whose resolved output flows back into the registry.
//!
//! Requests and replication feed each other over bounded queues, so diff
//! updates wait in a local backlog and are handed over one permit at a time
//! while resolved requests keep draining. No new snapshot is absorbed until
//! the backlog is empty.

use std::collections::VecDeque;
use std::time::Duration;

use lift_protocol::{
    AliveSet, AliveSetUpdate, ElevatorStateUpdate, PeerId, PeerSignal, PhysicalState, Request,
    RequestUpdate,
};
use lift_state::Registry;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::wire::WireMessage;
use crate::NetworkError;

/// Everything a single inbound snapshot produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absorbed {
    pub signal: PeerSignal,
    pub state: ElevatorStateUpdate,
    pub updates: Vec<RequestUpdate>,
}

/// Registry snapshot plus the local physical state that rides along with it.
#[derive(Debug, Clone)]
pub struct Replica {
    local: PeerId,
    registry: Registry,
    local_state: Option<PhysicalState>,
    alive: AliveSet,
}

impl Replica {
    pub fn new(local: PeerId, num_floors: u8) -> Self {
        let mut registry = Registry::new(num_floors);
        registry.register_peer(local);
        Self {
            local,
            registry,
            local_state: None,
            alive: AliveSet::from([local]),
        }
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn local_state(&self) -> Option<PhysicalState> {
        self.local_state
    }

    /// Write a request resolved by the local request server into the
    /// outgoing registry.
    pub fn record_local(&mut self, request: &Request) -> bool {
        let changed = self.registry.apply(request);
        if changed {
            tracing::debug!(request = %request, registry = %self.registry, "Registry updated");
        }
        changed
    }

    /// Remember the latest local physical state. Returns `false` for a
    /// repeat of the current one.
    pub fn observe_local_state(&mut self, state: PhysicalState) -> bool {
        match self.local_state {
            Some(current) if current == state => false,
            None => {
                tracing::info!(state = %state, "First local elevator state, broadcasting enabled");
                self.local_state = Some(state);
                true
            }
            Some(_) => {
                tracing::debug!(state = %state, "Local elevator state changed");
                self.local_state = Some(state);
                true
            }
        }
    }

    pub fn set_alive(&mut self, alive: AliveSet) {
        self.alive = alive;
    }

    /// The broadcast for this tick, if there is anything meaningful to say.
    ///
    /// Nothing is sent before the first local state is known, or while the
    /// local controller has reported itself failed; silence lets the fleet
    /// time it out of every quorum.
    pub fn outbound(&self) -> Option<WireMessage> {
        let elevator_state = self.local_state?;
        if !self.alive.contains(&self.local) {
            return None;
        }
        Some(WireMessage {
            source: self.local,
            registry: self.registry.clone(),
            elevator_state,
        })
    }

    /// Diff a peer's snapshot against the local registry.
    ///
    /// Returns `None` for the local controller's own broadcast echoing back.
    pub fn absorb(&mut self, msg: &WireMessage) -> Option<Absorbed> {
        if msg.source == self.local {
            return None;
        }

        let updates = self.registry.diff(msg.source, &msg.registry);
        if !updates.is_empty() {
            tracing::debug!(
                peer = %msg.source,
                changed = updates.len(),
                local = %self.registry,
                remote = %msg.registry,
                "Registry diff"
            );
        }

        Some(Absorbed {
            signal: PeerSignal::alive(msg.source),
            state: ElevatorStateUpdate {
                elevator: msg.source,
                state: msg.elevator_state,
            },
            updates,
        })
    }
}

/// Queues connecting the replication server to the rest of the node.
pub struct ReplicationLinks {
    /// Requests resolved by the local request server.
    pub resolved: mpsc::Receiver<RequestUpdate>,
    /// Physical state of the local car, from the driver.
    pub local_state: mpsc::Receiver<PhysicalState>,
    /// Alive-set changes from the liveness monitor.
    pub alive: mpsc::Receiver<AliveSetUpdate>,
    /// Decoded snapshots from the transport.
    pub inbound: mpsc::Receiver<WireMessage>,
    /// Snapshots for the transport to broadcast.
    pub outbound: mpsc::Sender<WireMessage>,
    /// Request updates derived from remote snapshots.
    pub to_requests: mpsc::Sender<RequestUpdate>,
    /// Evidence of life for the liveness monitor.
    pub to_liveness: mpsc::Sender<PeerSignal>,
    /// Physical states, local and remote, for order assignment.
    pub to_orders: mpsc::Sender<ElevatorStateUpdate>,
}

pub struct ReplicationServer {
    replica: Replica,
    broadcast_interval: Duration,
}

impl ReplicationServer {
    pub fn new(local: PeerId, num_floors: u8, broadcast_interval: Duration) -> Self {
        Self {
            replica: Replica::new(local, num_floors),
            broadcast_interval,
        }
    }

    /// Run until either the request server or the transport goes away.
    pub async fn run(mut self, mut links: ReplicationLinks) -> Result<(), NetworkError> {
        let local = self.replica.local();
        tracing::info!(
            local = %local,
            interval_ms = self.broadcast_interval.as_millis() as u64,
            "Replication server started"
        );

        let mut ticker = tokio::time::interval(self.broadcast_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut backlog: VecDeque<RequestUpdate> = VecDeque::new();

        loop {
            tokio::select! {
                resolved = links.resolved.recv() => {
                    let Some(update) = resolved else { break };
                    self.replica.record_local(&update.request);
                }
                Some(state) = links.local_state.recv() => {
                    if self.replica.observe_local_state(state) {
                        links
                            .to_orders
                            .send(ElevatorStateUpdate { elevator: local, state })
                            .await
                            .map_err(|_| NetworkError::ChannelClosed("orders"))?;
                    }
                }
                Some(alive) = links.alive.recv() => {
                    self.replica.set_alive(alive.peers);
                }
                inbound = links.inbound.recv(), if backlog.is_empty() => {
                    let Some(msg) = inbound else { break };
                    if let Some(absorbed) = self.replica.absorb(&msg) {
                        forward(&absorbed, &links).await?;
                        backlog.extend(absorbed.updates);
                    }
                }
                permit = links.to_requests.reserve(), if !backlog.is_empty() => {
                    let permit = permit.map_err(|_| NetworkError::ChannelClosed("requests"))?;
                    if let Some(update) = backlog.pop_front() {
                        permit.send(update);
                    }
                }
                _ = ticker.tick() => {
                    if let Some(msg) = self.replica.outbound() {
                        tracing::trace!(registry = %msg.registry, "Broadcasting registry");
                        links
                            .outbound
                            .send(msg)
                            .await
                            .map_err(|_| NetworkError::ChannelClosed("outbound"))?;
                    }
                }
            }
        }

        tracing::info!(local = %local, "Replication server stopped");
        Ok(())
    }
}

/// Hand the sender's liveness evidence and physical state onwards.
async fn forward(absorbed: &Absorbed, links: &ReplicationLinks) -> Result<(), NetworkError> {
    links
        .to_liveness
        .send(absorbed.signal)
        .await
        .map_err(|_| NetworkError::ChannelClosed("liveness"))?;
    links
        .to_orders
        .send(absorbed.state)
        .await
        .map_err(|_| NetworkError::ChannelClosed("orders"))?;
    Ok(())
}
