//! Acknowledgment ledger: which peers have witnessed the current
//! unconfirmed cycle of each request origin.
//!
//! Adding a witness is commutative and idempotent, so duplicate or
//! reordered acknowledgments from the anti-entropy layer never double count.

use std::collections::{BTreeSet, HashMap};

use lift_protocol::{AliveSet, Origin, PeerId, CAB_MIN_WITNESSES, HALL_MIN_WITNESSES};

/// Per-origin acknowledgment sets, owned by the request manager.
#[derive(Debug, Clone, Default)]
pub struct AckLedger {
    entries: HashMap<Origin, BTreeSet<PeerId>>,
}

impl AckLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `peer` has acknowledged the current cycle of `origin`.
    pub fn acknowledge(&mut self, origin: Origin, peer: PeerId) {
        self.entries.entry(origin).or_default().insert(peer);
    }

    /// Forget every acknowledgment for `origin`, rearming its cycle.
    pub fn reset(&mut self, origin: &Origin) {
        self.entries.remove(origin);
    }

    pub fn witnesses(&self, origin: &Origin) -> Option<&BTreeSet<PeerId>> {
        self.entries.get(origin)
    }

    pub fn witness_count(&self, origin: &Origin) -> usize {
        self.entries.get(origin).map_or(0, BTreeSet::len)
    }

    /// Whether the acknowledgments for `origin` form a quorum over `alive`.
    ///
    /// Every alive peer must have acknowledged. Hall calls additionally need
    /// at least two distinct witnesses, so a lone controller can never light
    /// a hall lamp on its own word.
    ///
    /// An empty alive set (the local controller failed and no peer is heard)
    /// is covered by any witness, so a failed controller keeps confirming its
    /// own cab calls while hall calls stay held by the witness minimum.
    pub fn has_quorum(&self, origin: &Origin, alive: &AliveSet) -> bool {
        let Some(witnesses) = self.entries.get(origin) else {
            return false;
        };

        let min_witnesses = match origin {
            Origin::Hall { .. } => HALL_MIN_WITNESSES,
            Origin::Cab { .. } => CAB_MIN_WITNESSES,
        };

        witnesses.len() >= min_witnesses && alive.is_subset(witnesses)
    }

    /// Number of origins with an open acknowledgment cycle.
    pub fn open_cycles(&self) -> usize {
        self.entries.len()
    }
}
