use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::*;

// ── Inter-actor messages ──
//
// Every actor owns its state; these are the copies that travel between them.

/// A status observation for one origin, attributed to the peer that made it.
///
/// Produced by local button detection, by the request server after
/// resolving an update, and by the registry diff on behalf of a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUpdate {
    pub source: PeerId,
    pub request: Request,
}

impl RequestUpdate {
    pub fn new(source: PeerId, origin: Origin, status: Status) -> Self {
        Self {
            source,
            request: Request::new(origin, status),
        }
    }
}

/// Evidence of life (or self-reported failure) for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSignal {
    pub id: PeerId,
    pub alive: bool,
}

impl PeerSignal {
    pub fn alive(id: PeerId) -> Self {
        Self { id, alive: true }
    }

    pub fn dead(id: PeerId) -> Self {
        Self { id, alive: false }
    }
}

/// The set of peers currently believed reachable and functioning.
pub type AliveSet = BTreeSet<PeerId>;

/// Emitted by the liveness monitor whenever the alive set changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliveSetUpdate {
    pub peers: AliveSet,
}

/// Physical state reported for one elevator, local or remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevatorStateUpdate {
    pub elevator: PeerId,
    pub state: PhysicalState,
}

/// Per-floor `[hall up, hall down, cab]` service flags for one elevator.
pub type Order = Vec<[bool; 3]>;

/// New service orders computed for the local elevator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub order: Order,
}

/// Render an order as one `[hu hd cab]` bit group per floor.
pub fn order_to_string(order: &Order) -> String {
    order
        .iter()
        .map(|row| {
            let bits: String = row.iter().map(|b| if *b { '1' } else { '0' }).collect();
            format!("[{bits}]")
        })
        .collect::<Vec<_>>()
        .join(" ")
}
