//! Peer liveness monitor.
//!
//! A peer is alive while its last positive signal is younger than the
//! timeout. The alive set is recomputed on a fixed poll and published only
//! when it changes, so steady membership costs no messages.

use std::collections::HashMap;
use std::time::Duration;

use lift_protocol::{AliveSet, AliveSetUpdate, PeerId, PeerSignal};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::NetworkError;

/// Last-seen bookkeeping and alive-set derivation, free of any I/O.
#[derive(Debug, Clone)]
pub struct PeerMonitor {
    local: PeerId,
    timeout: Duration,
    last_seen: HashMap<PeerId, Instant>,
    /// Set while the local controller has reported its own failure.
    local_failed: bool,
    /// Alive set as last published.
    alive: AliveSet,
}

impl PeerMonitor {
    pub fn new(local: PeerId, timeout: Duration) -> Self {
        Self {
            local,
            timeout,
            last_seen: HashMap::new(),
            local_failed: false,
            alive: AliveSet::new(),
        }
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    pub fn alive(&self) -> &AliveSet {
        &self.alive
    }

    pub fn local_failed(&self) -> bool {
        self.local_failed
    }

    /// Record a signal received at `now`.
    ///
    /// A negative signal back-dates the peer's last contact by a full
    /// timeout, so the next poll drops it.
    pub fn observe(&mut self, signal: PeerSignal, now: Instant) {
        let PeerSignal { id, alive } = signal;

        if id == self.local {
            if self.local_failed == alive {
                tracing::info!(peer = %id, alive, "Local health changed");
            }
            self.local_failed = !alive;
        }

        if alive {
            if self.last_seen.insert(id, now).is_none() && id != self.local {
                tracing::info!(peer = %id, "New peer seen");
            }
            return;
        }

        match now.checked_sub(self.timeout) {
            Some(expired) => {
                self.last_seen.insert(id, expired);
            }
            None => {
                self.last_seen.remove(&id);
            }
        }
    }

    /// The alive set as of `now`.
    pub fn compute(&self, now: Instant) -> AliveSet {
        let mut alive: AliveSet = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) < self.timeout)
            .map(|(id, _)| *id)
            .collect();

        if self.local_failed {
            alive.remove(&self.local);
        } else {
            alive.insert(self.local);
        }
        alive
    }

    /// Recompute the alive set; returns it only if it differs from the one
    /// last returned.
    pub fn poll(&mut self, now: Instant) -> Option<AliveSet> {
        let next = self.compute(now);
        if next == self.alive {
            return None;
        }

        for joined in next.difference(&self.alive) {
            tracing::info!(peer = %joined, "Peer alive");
        }
        for left in self.alive.difference(&next) {
            tracing::info!(peer = %left, "Peer lost");
        }

        self.alive = next.clone();
        Some(next)
    }
}

/// Queues connecting the liveness monitor to the rest of the node.
pub struct LivenessLinks {
    /// Positive signals from inbound traffic, plus local health reports.
    pub signals: mpsc::Receiver<PeerSignal>,
    /// Every consumer of alive-set changes.
    pub subscribers: Vec<(&'static str, mpsc::Sender<AliveSetUpdate>)>,
}

/// Actor wrapper that polls a `PeerMonitor` on a fixed interval.
pub struct LivenessMonitor {
    monitor: PeerMonitor,
    poll_interval: Duration,
}

impl LivenessMonitor {
    pub fn new(local: PeerId, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            monitor: PeerMonitor::new(local, timeout),
            poll_interval,
        }
    }

    /// Run until the signal queue closes.
    ///
    /// The first poll fires immediately, so subscribers learn the initial
    /// alive set (just the local controller) at startup.
    pub async fn run(mut self, mut links: LivenessLinks) -> Result<(), NetworkError> {
        let local = self.monitor.local();
        tracing::info!(
            local = %local,
            poll_ms = self.poll_interval.as_millis() as u64,
            "Liveness monitor started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                signal = links.signals.recv() => {
                    let Some(signal) = signal else { break };
                    self.monitor.observe(signal, Instant::now());
                    // Local health changes take effect without waiting a poll.
                    if signal.id == local {
                        self.publish(&links).await?;
                    }
                }
                _ = ticker.tick() => {
                    self.publish(&links).await?;
                }
            }
        }

        tracing::info!(local = %local, "Liveness monitor stopped");
        Ok(())
    }

    async fn publish(&mut self, links: &LivenessLinks) -> Result<(), NetworkError> {
        let Some(peers) = self.monitor.poll(Instant::now()) else {
            return Ok(());
        };

        tracing::info!(alive = ?peers, "Alive set changed");
        for (name, subscriber) in &links.subscribers {
            subscriber
                .send(AliveSetUpdate {
                    peers: peers.clone(),
                })
                .await
                .map_err(|_| NetworkError::ChannelClosed(*name))?;
        }
        Ok(())
    }
}
