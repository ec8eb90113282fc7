//! Forwarding engine and self-learning strategy.
//!
//! This crate hosts the forwarding side of the daemon: faces and the face
//! table, the PIT, FIB and content store, the forwarder operations the
//! strategy layer consumes, the forwarding-loop engine, the bridge to the
//! RIB thread, and the strategy layer itself.

pub mod bridge;
pub mod channel;
pub mod cs;
pub mod engine;
pub mod face;
pub mod fib;
pub mod forwarder;
pub mod pit;
pub mod strategy;

pub use bridge::{MainTask, RibBridge};
pub use engine::{Engine, FwEvent};
pub use face::{Face, FaceEndpoint, FaceTable};
pub use forwarder::Forwarder;
