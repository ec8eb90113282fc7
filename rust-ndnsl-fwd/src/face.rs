//! Faces and the face table.
//!
//! A face abstracts one link. The forwarding loop hands outgoing packets to
//! the face's channel-backed sender; a transport task drains it. Faces are
//! shared as `Arc` so PIT records can reference them cheaply.

use crate::channel::Channel;
use log::warn;
use rust_ndnsl_common::lp::NdnPacket;
use rust_ndnsl_common::types::{
    EndpointId, FaceId, FacePersistency, FaceScope, LinkType, INVALID_FACE_ID,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One link endpoint of this forwarder.
pub struct Face {
    id: FaceId,
    scope: FaceScope,
    link_type: LinkType,
    persistency: FacePersistency,
    remote: Option<EndpointId>,
    channel: Option<Arc<dyn Channel>>,
    tx: mpsc::UnboundedSender<NdnPacket>,
}

impl Face {
    /// Creates a face whose outgoing packets are pushed into `tx`.
    ///
    /// The id stays invalid until the face is added to a [`FaceTable`].
    pub fn new(scope: FaceScope, link_type: LinkType, tx: mpsc::UnboundedSender<NdnPacket>) -> Self {
        Self {
            id: INVALID_FACE_ID,
            scope,
            link_type,
            persistency: FacePersistency::Persistent,
            remote: None,
            channel: None,
            tx,
        }
    }

    pub fn with_persistency(mut self, persistency: FacePersistency) -> Self {
        self.persistency = persistency;
        self
    }

    pub fn with_remote(mut self, remote: EndpointId) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Associates the channel this face was created from, enabling
    /// on-demand peer face creation.
    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: FaceId) {
        self.id = id;
    }

    pub fn scope(&self) -> FaceScope {
        self.scope
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn persistency(&self) -> FacePersistency {
        self.persistency
    }

    pub fn remote(&self) -> Option<&EndpointId> {
        self.remote.as_ref()
    }

    pub fn channel(&self) -> Option<&Arc<dyn Channel>> {
        self.channel.as_ref()
    }

    pub fn is_local(&self) -> bool {
        self.scope == FaceScope::Local
    }

    /// Queues a packet for transmission on this face.
    pub fn send(&self, packet: NdnPacket) {
        if self.tx.send(packet).is_err() {
            warn!("[Face {}] transport gone, dropping outgoing packet", self.id);
        }
    }
}

impl fmt::Debug for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Face")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("link_type", &self.link_type)
            .field("persistency", &self.persistency)
            .field("remote", &self.remote)
            .finish()
    }
}

/// Ingress identity of a packet: the face it arrived on plus, on
/// multi-access links, the remote endpoint that sent it.
#[derive(Debug, Clone)]
pub struct FaceEndpoint {
    pub face: Arc<Face>,
    pub endpoint: Option<EndpointId>,
}

impl FaceEndpoint {
    pub fn new(face: Arc<Face>) -> Self {
        Self {
            face,
            endpoint: None,
        }
    }

    pub fn with_endpoint(face: Arc<Face>, endpoint: EndpointId) -> Self {
        Self {
            face,
            endpoint: Some(endpoint),
        }
    }
}

impl fmt::Display for FaceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            Some(endpoint) => write!(f, "face={}@{}", self.face.id(), endpoint),
            None => write!(f, "face={}", self.face.id()),
        }
    }
}

/// All faces of this forwarder, ordered by ascending face id.
#[derive(Debug, Default)]
pub struct FaceTable {
    faces: BTreeMap<u64, Arc<Face>>,
    next_id: u64,
}

impl FaceTable {
    pub fn new() -> Self {
        Self {
            faces: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Adds a face, assigning it the next free id.
    pub fn add(&mut self, mut face: Face) -> Arc<Face> {
        let id = FaceId(self.next_id);
        self.next_id += 1;
        face.set_id(id);
        let face = Arc::new(face);
        self.faces.insert(id.0, face.clone());
        face
    }

    pub fn get(&self, id: FaceId) -> Option<Arc<Face>> {
        self.faces.get(&id.0).cloned()
    }

    pub fn remove(&mut self, id: FaceId) -> Option<Arc<Face>> {
        self.faces.remove(&id.0)
    }

    /// Iterates faces in ascending id order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<Face>> {
        self.faces.values()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
