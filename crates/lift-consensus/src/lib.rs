//! Lift Consensus - request lifecycle and acknowledgment quorum
//!
//! Decides when a button press has been witnessed by every live controller
//! and is therefore safe to light and assign. The decision is purely local:
//! acknowledgments arrive as ordinary `Unconfirmed` updates relayed by the
//! anti-entropy layer, and quorum membership comes from the liveness monitor.

pub mod ledger;
pub mod manager;
pub mod server;

pub use ledger::AckLedger;
pub use manager::RequestManager;
pub use server::{ButtonLamp, RequestServer, RequestServerLinks};

use thiserror::Error;

/// Errors that stop the request server.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("{0} queue closed")]
    ChannelClosed(&'static str),
}
