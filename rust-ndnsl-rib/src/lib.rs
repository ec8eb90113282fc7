//! RIB service for the self-learning micro NDN forwarder.
//!
//! The RIB owns the authoritative route database and the Prefix
//! Announcements that created those routes. It runs on its own event loop
//! (the RIB thread): the forwarding side posts boxed tasks to it and gets
//! continuations posted back. Route changes are propagated to the FIB
//! through a channel of [`rust_ndnsl_common::types::FibUpdate`] messages.

pub mod route;
pub mod service;

pub use route::{RibEntry, Route, RouteOrigin};
pub use service::{RibService, RibTask, SlAnnounceResult};
