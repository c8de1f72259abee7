//! Order assignment.
//!
//! Caches every settled request, the latest physical state of each peer and
//! the alive set, and periodically asks a hall request assigner which car
//! serves what. Only the local car's orders leave this module.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use lift_protocol::{
    order_to_string, AliveSet, AliveSetUpdate, Direction, ElevatorStateUpdate, Order, Origin,
    PeerId, PhysicalState, Request, RequestUpdate, ServiceOrder, Status,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Orders for every car, keyed by peer.
pub type Assignment = BTreeMap<PeerId, Order>;

#[derive(Debug, Error)]
pub enum AssignError {
    #[error("failed to run assigner: {0}")]
    Io(#[from] std::io::Error),

    #[error("assigner JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("assigner failed: {0}")]
    Failed(String),
}

/// Input document of the hall request assigner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignerInput {
    /// `[up, down]` per floor.
    pub hall_requests: Vec<[bool; 2]>,
    pub states: BTreeMap<PeerId, AssignerState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignerState {
    pub behaviour: &'static str,
    pub floor: u8,
    pub direction: &'static str,
    pub cab_requests: Vec<bool>,
}

/// Decides which car serves which request.
pub trait Assigner: Send {
    fn assign(
        &mut self,
        input: &AssignerInput,
    ) -> impl Future<Output = Result<Assignment, AssignError>> + Send;
}

/// Runs an external `hall_request_assigner` executable.
#[derive(Debug, Clone)]
pub struct ExternalAssigner {
    path: PathBuf,
}

impl ExternalAssigner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Assigner for ExternalAssigner {
    async fn assign(&mut self, input: &AssignerInput) -> Result<Assignment, AssignError> {
        let json = serde_json::to_string(input)?;
        let output = tokio::process::Command::new(&self.path)
            .arg("-i")
            .arg(&json)
            .arg("--includeCab")
            .output()
            .await?;

        if !output.status.success() {
            return Err(AssignError::Failed(format!(
                "{} exited with {}: {}",
                self.path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Everything the assigner needs, as last reported.
#[derive(Debug, Clone)]
pub struct OrderCache {
    num_floors: usize,
    hall: Vec<[bool; 2]>,
    cab: BTreeMap<PeerId, Vec<bool>>,
    states: BTreeMap<PeerId, PhysicalState>,
    alive: AliveSet,
}

impl OrderCache {
    pub fn new(num_floors: u8) -> Self {
        let num_floors = usize::from(num_floors);
        Self {
            num_floors,
            hall: vec![[false; 2]; num_floors],
            cab: BTreeMap::new(),
            states: BTreeMap::new(),
            alive: AliveSet::new(),
        }
    }

    /// Record a settled request. Returns whether the cache changed.
    pub fn apply_request(&mut self, request: &Request) -> bool {
        if !request.status.is_actionable() {
            return false;
        }
        if let Err(e) = request.origin.validate(self.num_floors as u8) {
            tracing::warn!(origin = %request.origin, error = %e, "Ignoring order request");
            return false;
        }

        let active = request.status == Status::Confirmed;
        let floor = usize::from(request.origin.floor());
        let slot = match request.origin {
            Origin::Hall { direction: Direction::Up, .. } => &mut self.hall[floor][0],
            Origin::Hall { direction: Direction::Down, .. } => &mut self.hall[floor][1],
            Origin::Cab { owner, .. } => {
                let num_floors = self.num_floors;
                &mut self.cab.entry(owner).or_insert_with(|| vec![false; num_floors])[floor]
            }
        };

        let changed = *slot != active;
        *slot = active;
        changed
    }

    /// Record a car's physical state. A first state also opens its cab row.
    pub fn apply_state(&mut self, update: &ElevatorStateUpdate) -> bool {
        let previous = self.states.insert(update.elevator, update.state);
        let num_floors = self.num_floors;
        self.cab
            .entry(update.elevator)
            .or_insert_with(|| vec![false; num_floors]);
        previous != Some(update.state)
    }

    /// Replace the alive set. Dead peers keep their state and cab row, so a
    /// peer that rejoins is assigned its confirmed cab calls again.
    pub fn set_alive(&mut self, alive: AliveSet) {
        for dead in self.alive.difference(&alive) {
            tracing::debug!(peer = %dead, "Peer left order assignment");
        }
        self.alive = alive;
    }

    /// Every alive peer has a state and a cab row. Rows of peers outside the
    /// alive set do not count.
    pub fn is_consistent(&self) -> bool {
        self.alive
            .iter()
            .all(|id| self.states.contains_key(id) && self.cab.contains_key(id))
    }

    /// Assigner input over the alive peers, if the cache is consistent.
    pub fn input(&self) -> Option<AssignerInput> {
        if !self.is_consistent() {
            return None;
        }

        let states = self
            .alive
            .iter()
            .filter_map(|id| {
                let state = self.states.get(id)?;
                let cab = self.cab.get(id)?;
                Some((
                    *id,
                    AssignerState {
                        behaviour: state.behavior.as_assigner_str(),
                        floor: state.floor,
                        direction: state.direction.as_assigner_str(),
                        cab_requests: cab.clone(),
                    },
                ))
            })
            .collect();

        Some(AssignerInput {
            hall_requests: self.hall.clone(),
            states,
        })
    }
}

/// Queues connecting the order server to the rest of the node.
pub struct OrderLinks {
    pub requests: mpsc::Receiver<RequestUpdate>,
    pub states: mpsc::Receiver<ElevatorStateUpdate>,
    pub alive: mpsc::Receiver<AliveSetUpdate>,
    pub orders: mpsc::Sender<ServiceOrder>,
}

pub struct OrderServer<A> {
    local: PeerId,
    cache: OrderCache,
    assigner: Option<A>,
    refresh_interval: Duration,
    last: Assignment,
}

impl<A: Assigner> OrderServer<A> {
    pub fn new(local: PeerId, num_floors: u8, refresh_interval: Duration, assigner: Option<A>) -> Self {
        Self {
            local,
            cache: OrderCache::new(num_floors),
            assigner,
            refresh_interval,
            last: Assignment::new(),
        }
    }

    /// Run until the request queue closes.
    pub async fn run(mut self, mut links: OrderLinks) -> anyhow::Result<()> {
        if self.assigner.is_none() {
            tracing::warn!("No assigner configured, orders will not be computed");
        }

        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                update = links.requests.recv() => {
                    let Some(update) = update else { break };
                    if self.cache.apply_request(&update.request) {
                        tracing::debug!(request = %update.request, "Order cache updated");
                    }
                }
                Some(update) = links.states.recv() => {
                    self.cache.apply_state(&update);
                }
                Some(alive) = links.alive.recv() => {
                    self.cache.set_alive(alive.peers);
                }
                _ = ticker.tick() => {
                    self.refresh(&links).await?;
                }
            }
        }

        tracing::info!("Order server stopped");
        Ok(())
    }

    async fn refresh(&mut self, links: &OrderLinks) -> anyhow::Result<()> {
        let Some(assigner) = self.assigner.as_mut() else {
            return Ok(());
        };
        let Some(input) = self.cache.input() else {
            tracing::debug!("Order cache inconsistent, skipping assignment");
            return Ok(());
        };

        let assignment = match assigner.assign(&input).await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(error = %e, "Order assignment failed");
                return Ok(());
            }
        };
        if assignment == self.last {
            return Ok(());
        }

        for (peer, order) in &assignment {
            if self.last.get(peer) != Some(order) {
                tracing::info!(peer = %peer, order = %order_to_string(order), "Orders changed");
            }
        }

        let local_order = assignment.get(&self.local).cloned();
        let local_changed = local_order.as_ref() != self.last.get(&self.local);
        self.last = assignment;

        if let (true, Some(order)) = (local_changed, local_order) {
            links
                .orders
                .send(ServiceOrder { order })
                .await
                .map_err(|_| anyhow::anyhow!("service order queue closed"))?;
        }
        Ok(())
    }
}
