//! Request lifecycle state machine with acknowledgment quorum.
//!
//! Each origin cycles like a counter:
//!
//! ```text
//! Absent -> Unconfirmed -> Confirmed -> Absent
//! ```
//!
//! - `Unknown` updates carry no information and never overwrite anything.
//! - `Absent` clears a request only once it is `Confirmed` (or unknown);
//!   a clear racing an in-flight confirmation is ignored.
//! - `Unconfirmed` updates are acknowledgments: the sender and the local
//!   controller join the origin's ledger, and once the ledger covers the
//!   alive set the request becomes `Confirmed` and the ledger is rearmed.
//! - `Confirmed` from a peer is trusted for an `Unconfirmed` request, since
//!   a peer only ever derives `Confirmed` from its own quorum. It never
//!   resurrects an `Absent` one.

use std::collections::HashMap;

use lift_protocol::{AliveSet, Origin, PeerId, Request, RequestUpdate, Status};

use crate::ledger::AckLedger;

/// Owns the status of every known origin plus the ledger and alive set that
/// decide confirmations.
#[derive(Debug, Clone)]
pub struct RequestManager {
    /// Local controller id, added to every ledger it processes.
    local: PeerId,
    /// Latest resolved status per origin. Missing means `Unknown`.
    statuses: HashMap<Origin, Status>,
    /// Acknowledgments for the current unconfirmed cycle of each origin.
    ledger: AckLedger,
    /// Quorum membership, as last reported by the liveness monitor.
    alive: AliveSet,
}

impl RequestManager {
    /// Create a manager that initially believes only itself to be alive.
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            statuses: HashMap::new(),
            ledger: AckLedger::new(),
            alive: AliveSet::from([local]),
        }
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    pub fn status(&self, origin: &Origin) -> Status {
        self.statuses.get(origin).copied().unwrap_or_default()
    }

    pub fn alive(&self) -> &AliveSet {
        &self.alive
    }

    pub fn ledger(&self) -> &AckLedger {
        &self.ledger
    }

    /// Apply one update and return the resolved request for its origin.
    pub fn process(&mut self, update: &RequestUpdate) -> Request {
        let origin = update.request.origin;
        let current = self.status(&origin);

        let next = match update.request.status {
            Status::Unknown => current,
            Status::Absent => self.on_absent(current),
            Status::Unconfirmed => self.on_unconfirmed(origin, current, update.source),
            Status::Confirmed => self.on_confirmed(origin, current),
        };

        if next != current {
            tracing::debug!(
                origin = %origin,
                from = %current,
                to = %next,
                source = %update.source,
                "Request transitioned"
            );
        }

        if next != Status::Unknown {
            self.statuses.insert(origin, next);
        }

        Request::new(origin, next)
    }

    fn on_absent(&self, current: Status) -> Status {
        match current {
            // A confirmed request was agreed by every alive peer, so any
            // single controller's clear is enough.
            Status::Confirmed | Status::Unknown => Status::Absent,
            Status::Absent | Status::Unconfirmed => current,
        }
    }

    fn on_unconfirmed(&mut self, origin: Origin, current: Status, source: PeerId) -> Status {
        if current == Status::Confirmed {
            return current;
        }

        self.ledger.acknowledge(origin, source);
        self.ledger.acknowledge(origin, self.local);

        if self.ledger.has_quorum(&origin, &self.alive) {
            self.ledger.reset(&origin);
            Status::Confirmed
        } else {
            Status::Unconfirmed
        }
    }

    fn on_confirmed(&mut self, origin: Origin, current: Status) -> Status {
        match current {
            // Unknown only happens before anything was heard about the
            // origin, e.g. right after a restart: adopt the fleet's view.
            Status::Unconfirmed | Status::Unknown => {
                self.ledger.reset(&origin);
                Status::Confirmed
            }
            Status::Absent | Status::Confirmed => current,
        }
    }

    /// Replace the quorum membership.
    ///
    /// Returns the requests that reach quorum under the new membership, which
    /// happens when a peer whose acknowledgment was outstanding has died.
    pub fn update_alive(&mut self, alive: AliveSet) -> Vec<Request> {
        if alive == self.alive {
            return Vec::new();
        }

        tracing::debug!(
            local = %self.local,
            before = ?self.alive,
            after = ?alive,
            "Quorum membership changed"
        );
        self.alive = alive;

        let pending: Vec<Origin> = self
            .statuses
            .iter()
            .filter(|(_, status)| **status == Status::Unconfirmed)
            .map(|(origin, _)| *origin)
            .collect();

        let mut confirmed = Vec::new();
        for origin in pending {
            if self.ledger.has_quorum(&origin, &self.alive) {
                self.ledger.reset(&origin);
                self.statuses.insert(origin, Status::Confirmed);
                tracing::debug!(origin = %origin, "Request confirmed after membership shrank");
                confirmed.push(Request::new(origin, Status::Confirmed));
            }
        }
        confirmed
    }
}
