//! Route database entries.

use rust_ndnsl_common::announcement::PrefixAnnouncement;
use rust_ndnsl_common::ndn::Name;
use rust_ndnsl_common::types::FaceId;
use tokio::time::Instant;

/// How a route entered the RIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOrigin {
    /// Configured by the operator; never expires.
    Static,
    /// Learned from a Prefix Announcement.
    PrefixAnn,
}

/// One next-hop for an announced prefix.
#[derive(Debug, Clone)]
pub struct Route {
    pub face: FaceId,
    pub origin: RouteOrigin,
    pub cost: u32,
    /// Absolute expiry; `None` for static routes.
    pub expiry: Option<Instant>,
    /// The announcement that created this route, kept so it can be attached
    /// to Data answering discovery Interests later.
    pub announcement: Option<PrefixAnnouncement>,
}

impl Route {
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expiry, Some(expiry) if expiry <= now)
    }
}

/// All routes for one announced prefix.
#[derive(Debug, Clone)]
pub struct RibEntry {
    pub name: Name,
    pub routes: Vec<Route>,
}

impl RibEntry {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            routes: Vec::new(),
        }
    }

    pub fn route_on(&self, face: FaceId) -> Option<&Route> {
        self.routes.iter().find(|route| route.face == face)
    }

    pub fn route_on_mut(&mut self, face: FaceId) -> Option<&mut Route> {
        self.routes.iter_mut().find(|route| route.face == face)
    }
}
