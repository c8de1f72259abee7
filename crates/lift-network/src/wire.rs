//! The broadcast datagram.

use lift_protocol::{PeerId, PhysicalState};
use lift_state::Registry;
use serde::{Deserialize, Serialize};

use crate::NetworkError;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// One periodic broadcast: the sender's whole registry plus the latest
/// physical state of its own car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub source: PeerId,
    pub registry: Registry,
    pub elevator_state: PhysicalState,
}

impl WireMessage {
    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(NetworkError::Transport(format!(
                "message of {} bytes exceeds datagram limit",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
