//! Lift Node - the `liftd` process
//!
//! Wires the request server, replication, liveness and transport actors of
//! one elevator controller together, with a stdin console standing in for
//! the hardware driver and an external hall request assigner computing
//! service orders.

pub mod config;
pub mod console;
pub mod lamp;
pub mod node;
pub mod orders;

pub use config::{ConfigError, LiftConfig};
pub use node::Node;
