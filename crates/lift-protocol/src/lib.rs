//! Lift Protocol - Core types and message definitions
//!
//! Shared vocabulary of the request-synchronization fleet: peer identities,
//! request origins and their lifecycle status, the physical elevator state
//! that rides along with every broadcast, and the messages the actors
//! exchange over their queues.

pub mod constants;
pub mod error;
pub mod messages;
pub mod types;

pub use constants::*;
pub use error::*;
pub use messages::*;
pub use types::*;
