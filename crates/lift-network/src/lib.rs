//! Lift Network - liveness, broadcast transport and anti-entropy
//!
//! Every controller broadcasts its full request registry on a fixed
//! interval over best-effort UDP. Receiving anything from a peer is
//! evidence that it is alive; diffing its registry against the local one
//! turns the snapshot back into request updates for the request server.

pub mod liveness;
pub mod replication;
pub mod transport;
pub mod wire;

pub use liveness::{LivenessLinks, LivenessMonitor, PeerMonitor};
pub use replication::{Absorbed, Replica, ReplicationLinks, ReplicationServer};
pub use transport::{TransportConfig, UdpBroadcast};
pub use wire::WireMessage;

use thiserror::Error;

/// Errors that can occur in the networking layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("{0} queue closed")]
    ChannelClosed(&'static str),

    #[error("transport error: {0}")]
    Transport(String),
}
