//! Common types and utilities for the self-learning micro NDN forwarder.
//!
//! This crate provides the packet model shared by the forwarding engine,
//! the RIB service and the daemon: names, the TLV codec, Interest/Data/Nack
//! packets, link-protocol headers (tags), Prefix Announcements, and the
//! identifiers exchanged between the two event loops.

pub mod announcement;
pub mod error;
pub mod lp;
pub mod metrics;
pub mod ndn;
pub mod tags;
pub mod tlv;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
