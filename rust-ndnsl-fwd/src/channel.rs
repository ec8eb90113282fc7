//! Channels create peer faces on demand.
//!
//! When Data with a Prefix Announcement arrives on a multi-access face, the
//! strategy asks the face's channel for a unicast face towards the sender.
//! Creation is asynchronous: the implementation builds the face, adds it to
//! the forwarder's face table on the forwarding loop, and then invokes the
//! callback there.

use crate::face::Face;
use crate::forwarder::Forwarder;
use rust_ndnsl_common::types::{EndpointId, FacePersistency};
use std::sync::Arc;
use thiserror::Error;

/// Invoked on the forwarding loop once face creation settled.
pub type ConnectCallback =
    Box<dyn FnOnce(&mut Forwarder, Result<Arc<Face>, ChannelError>) + Send>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("endpoint {0} not supported by this channel")]
    UnsupportedEndpoint(String),
}

/// A face factory bound to one local transport.
pub trait Channel: Send + Sync {
    /// Opens (or reuses) a unicast face towards `remote`.
    ///
    /// The new face is added to the forwarder's face table before `done`
    /// runs; on failure `done` receives the error instead.
    fn connect(&self, remote: EndpointId, persistency: FacePersistency, done: ConnectCallback);
}
