//! The replication snapshot.
//!
//! Every broadcast carries the whole registry rather than a delta, so one
//! dropped datagram only delays information until the next broadcast. The
//! registry is only ever written with statuses the local request manager
//! has resolved; remote registries are read through `diff` and never merged
//! in directly.

use std::collections::BTreeMap;
use std::fmt;

use lift_protocol::{Direction, Floor, Origin, PeerId, Request, RequestUpdate, Status};
use serde::{Deserialize, Serialize};

/// Full local belief about every request, indexed by floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub hall_up: Vec<Status>,
    pub hall_down: Vec<Status>,
    /// Cab rows keyed by the owning controller. Rows outlive their owner's
    /// membership so a rebooted or reconnected peer can recover its calls.
    pub cab: BTreeMap<PeerId, Vec<Status>>,
}

impl Registry {
    pub fn new(num_floors: u8) -> Self {
        let floors = usize::from(num_floors);
        Self {
            hall_up: vec![Status::Unknown; floors],
            hall_down: vec![Status::Unknown; floors],
            cab: BTreeMap::new(),
        }
    }

    pub fn num_floors(&self) -> usize {
        self.hall_up.len()
    }

    /// Insert an all-`Unknown` cab row for `peer` if none exists yet.
    ///
    /// Returns `true` when the peer was new.
    pub fn register_peer(&mut self, peer: PeerId) -> bool {
        if self.cab.contains_key(&peer) {
            return false;
        }
        self.cab.insert(peer, vec![Status::Unknown; self.num_floors()]);
        tracing::debug!(peer = %peer, "Registered cab row for new peer");
        true
    }

    pub fn status(&self, origin: &Origin) -> Status {
        let floor = usize::from(origin.floor());
        let row = match origin {
            Origin::Hall { direction: Direction::Up, .. } => Some(&self.hall_up),
            Origin::Hall { direction: Direction::Down, .. } => Some(&self.hall_down),
            Origin::Cab { owner, .. } => self.cab.get(owner),
        };
        row.and_then(|r| r.get(floor)).copied().unwrap_or_default()
    }

    /// Record a status resolved by the local request manager.
    ///
    /// `Unknown` adds nothing and is skipped. Returns whether the registry
    /// changed.
    pub fn apply(&mut self, request: &Request) -> bool {
        if request.status == Status::Unknown {
            return false;
        }

        let origin = request.origin;
        if let Err(e) = origin.validate(self.num_floors() as u8) {
            tracing::warn!(origin = %origin, error = %e, "Ignoring request outside registry");
            return false;
        }

        let floor = usize::from(origin.floor());
        let slot = match origin {
            Origin::Hall { direction: Direction::Up, .. } => &mut self.hall_up[floor],
            Origin::Hall { direction: Direction::Down, .. } => &mut self.hall_down[floor],
            Origin::Cab { owner, .. } => {
                self.register_peer(owner);
                match self.cab.get_mut(&owner) {
                    Some(row) => &mut row[floor],
                    None => return false,
                }
            }
        };

        let changed = *slot != request.status;
        *slot = request.status;
        changed
    }

    /// Compare a registry received from `sender` against this one.
    ///
    /// Every differing cell becomes an update attributed to `sender` that
    /// carries the remote value. Peers seen for the first time (the sender
    /// and any cab owner it reports) are registered locally first. Only the
    /// floors both registries cover are compared.
    pub fn diff(&mut self, sender: PeerId, remote: &Registry) -> Vec<RequestUpdate> {
        self.register_peer(sender);
        for owner in remote.cab.keys() {
            self.register_peer(*owner);
        }

        let mut updates = Vec::new();

        let halls = [
            (Direction::Up, &self.hall_up, &remote.hall_up),
            (Direction::Down, &self.hall_down, &remote.hall_down),
        ];
        for (direction, local_row, remote_row) in halls {
            for (floor, (local, theirs)) in local_row.iter().zip(remote_row).enumerate() {
                if differs(*local, *theirs) {
                    updates.push(RequestUpdate::new(
                        sender,
                        Origin::hall(floor as Floor, direction),
                        *theirs,
                    ));
                }
            }
        }

        for (owner, remote_row) in &remote.cab {
            let Some(local_row) = self.cab.get(owner) else {
                continue;
            };
            for (floor, (local, theirs)) in local_row.iter().zip(remote_row).enumerate() {
                if differs(*local, *theirs) {
                    updates.push(RequestUpdate::new(
                        sender,
                        Origin::cab(floor as Floor, *owner),
                        *theirs,
                    ));
                }
            }
        }

        updates
    }
}

/// Whether a remote status should be fed back into the local manager.
///
/// Two `Unconfirmed` cells count as different so that acknowledgments keep
/// flowing every broadcast until the request is confirmed. A remote
/// `Unknown` contributes nothing.
pub fn differs(local: Status, remote: Status) -> bool {
    match (local, remote) {
        (Status::Unconfirmed, Status::Unconfirmed) => true,
        (_, Status::Unknown) => false,
        _ => local != remote,
    }
}

fn glyph(status: &Status) -> char {
    match status {
        Status::Unknown => '?',
        Status::Absent => 'A',
        Status::Unconfirmed => 'U',
        Status::Confirmed => 'C',
    }
}

fn row_string(row: &[Status]) -> String {
    row.iter().map(glyph).collect()
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "up[{}] down[{}]",
            row_string(&self.hall_up),
            row_string(&self.hall_down)
        )?;
        for (owner, row) in &self.cab {
            write!(f, " cab{}[{}]", owner, row_string(row))?;
        }
        Ok(())
    }
}
