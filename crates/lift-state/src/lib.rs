//! Lift State - the replicated request registry
//!
//! A controller's complete belief about every request, in the shape that is
//! gossiped: statuses per hall floor and direction, and per cab. Diffing a
//! peer's registry against the local one turns a lossy full-state broadcast
//! back into individual request updates.

pub mod registry;

pub use registry::{differs, Registry};
