use thiserror::Error;

use crate::types::Floor;

/// Errors raised while building or parsing protocol values.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("floor {floor} is outside the served range 0..{num_floors}")]
    InvalidFloor { floor: Floor, num_floors: u8 },

    #[error("parse error: {0}")]
    Parse(String),
}
