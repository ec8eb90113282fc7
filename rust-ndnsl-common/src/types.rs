//! Shared identifiers and messages exchanged between the forwarding loop,
//! the RIB service and the transports.

use crate::ndn::Name;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Maximum size of an NDN packet on the wire.
pub const MAX_PACKET_SIZE: usize = 8800;

/// Unique identifier for a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u64);

/// Id of a face that has not been added to the face table yet.
pub const INVALID_FACE_ID: FaceId = FaceId(0);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a face reaches a local application or a remote forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceScope {
    NonLocal,
    Local,
}

/// Link type of the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    PointToPoint,
    MultiAccess,
    AdHoc,
}

/// Face lifecycle policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacePersistency {
    /// Configured face, kept until explicitly removed.
    Persistent,
    /// Created in response to traffic, reclaimed when idle.
    OnDemand,
}

/// Remote endpoint identity on a multi-access link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointId {
    /// UDP peer address.
    Udp(SocketAddr),
    /// Link-layer (MAC) address.
    Dev([u8; 6]),
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointId::Udp(addr) => write!(f, "udp://{addr}"),
            EndpointId::Dev(mac) => write!(
                f,
                "dev://{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
            ),
        }
    }
}

/// FIB mutation produced by the RIB service and applied on the forwarding
/// loop.
#[derive(Debug, Clone, PartialEq)]
pub enum FibUpdate {
    Add {
        name: Name,
        face: FaceId,
        cost: u32,
    },
    Remove {
        name: Name,
        face: FaceId,
    },
}
