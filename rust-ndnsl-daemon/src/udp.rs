//! UDP transport: faces, driver and on-demand channel.
//!
//! One socket serves everything. Datagrams from configured peers map to
//! their point-to-point face; anything else arrives on the multicast face
//! with the sender recorded as the endpoint, so the strategy can open an
//! on-demand unicast face back to it.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rust_ndnsl_common::lp::NdnPacket;
use rust_ndnsl_common::types::{
    EndpointId, FaceId, FacePersistency, FaceScope, LinkType, MAX_PACKET_SIZE,
};
use rust_ndnsl_fwd::channel::{Channel, ChannelError, ConnectCallback};
use rust_ndnsl_fwd::{Face, FwEvent, Forwarder, MainTask};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

type PeerMap = Arc<Mutex<HashMap<SocketAddr, FaceId>>>;

fn lock_peers(peers: &PeerMap) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, FaceId>> {
    peers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drains a face's outgoing queue onto the socket.
fn spawn_writer(
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    mut rx: mpsc::UnboundedReceiver<NdnPacket>,
) {
    tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            match packet.to_bytes() {
                Ok(bytes) => {
                    if let Err(err) = socket.send_to(&bytes, dest).await {
                        warn!("send to {dest} failed: {err}");
                    }
                }
                Err(err) => warn!("failed to encode outgoing packet: {err}"),
            }
        }
    });
}

/// Creates on-demand unicast faces over the shared socket.
pub struct UdpChannel {
    socket: Arc<UdpSocket>,
    peers: PeerMap,
    main_tx: mpsc::UnboundedSender<MainTask>,
}

impl Channel for UdpChannel {
    fn connect(&self, remote: EndpointId, persistency: FacePersistency, done: ConnectCallback) {
        let addr = match remote {
            EndpointId::Udp(addr) => addr,
            other => {
                let task: MainTask = Box::new(move |fw| {
                    done(fw, Err(ChannelError::UnsupportedEndpoint(other.to_string())));
                });
                if self.main_tx.send(task).is_err() {
                    warn!("forwarding loop gone, dropping connect request");
                }
                return;
            }
        };

        let socket = self.socket.clone();
        let peers = self.peers.clone();
        let task: MainTask = Box::new(move |fw| {
            // Reuse an existing face for this peer when there is one.
            if let Some(&id) = lock_peers(&peers).get(&addr) {
                if let Some(face) = fw.get_face(id) {
                    done(fw, Ok(face));
                    return;
                }
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let face = fw.add_face(
                Face::new(FaceScope::NonLocal, LinkType::PointToPoint, tx)
                    .with_persistency(persistency)
                    .with_remote(EndpointId::Udp(addr)),
            );
            lock_peers(&peers).insert(addr, face.id());
            spawn_writer(socket, addr, rx);
            debug!("[Face {}] on-demand unicast face to {addr}", face.id());
            done(fw, Ok(face));
        });
        if self.main_tx.send(task).is_err() {
            warn!("forwarding loop gone, dropping connect request");
        }
    }
}

/// Receives datagrams and feeds them to the forwarding loop.
pub struct UdpFaceDriver {
    socket: Arc<UdpSocket>,
    peers: PeerMap,
    multicast_face: FaceId,
    events_tx: mpsc::UnboundedSender<FwEvent>,
}

impl UdpFaceDriver {
    /// Binds the socket, joins the multicast group, and creates the
    /// multicast face plus one point-to-point face per configured peer.
    pub async fn bind(
        listen: SocketAddr,
        group: SocketAddr,
        peer_addrs: &[SocketAddr],
        forwarder: &mut Forwarder,
        events_tx: mpsc::UnboundedSender<FwEvent>,
        main_tx: mpsc::UnboundedSender<MainTask>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(listen)
            .await
            .with_context(|| format!("failed to bind UDP socket on {listen}"))?;
        if let (IpAddr::V4(group_ip), IpAddr::V4(local_ip)) = (group.ip(), listen.ip()) {
            if group_ip.is_multicast() {
                socket
                    .join_multicast_v4(group_ip, local_ip)
                    .with_context(|| format!("failed to join multicast group {group_ip}"))?;
            }
        }
        let socket = Arc::new(socket);
        info!("UDP transport on {}", socket.local_addr()?);

        let peers: PeerMap = Arc::new(Mutex::new(HashMap::new()));
        let channel = Arc::new(UdpChannel {
            socket: socket.clone(),
            peers: peers.clone(),
            main_tx,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let multicast_face = forwarder.add_face(
            Face::new(FaceScope::NonLocal, LinkType::MultiAccess, tx)
                .with_remote(EndpointId::Udp(group))
                .with_channel(channel),
        );
        spawn_writer(socket.clone(), group, rx);

        for &addr in peer_addrs {
            let (tx, rx) = mpsc::unbounded_channel();
            let face = forwarder.add_face(
                Face::new(FaceScope::NonLocal, LinkType::PointToPoint, tx)
                    .with_remote(EndpointId::Udp(addr)),
            );
            lock_peers(&peers).insert(addr, face.id());
            spawn_writer(socket.clone(), addr, rx);
            info!("[Face {}] peer {addr}", face.id());
        }

        Ok(Self {
            socket,
            peers,
            multicast_face: multicast_face.id(),
            events_tx,
        })
    }

    /// The face created for a configured peer address.
    pub fn face_for(&self, addr: SocketAddr) -> Option<FaceId> {
        lock_peers(&self.peers).get(&addr).copied()
    }

    /// Receive loop; runs until the forwarding loop goes away.
    pub async fn run(self) {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let (len, addr) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    warn!("UDP receive error: {err}");
                    continue;
                }
            };
            let packet = match NdnPacket::from_bytes(&buf[..len]) {
                Ok(packet) => packet,
                Err(err) => {
                    debug!("malformed packet from {addr}: {err}");
                    continue;
                }
            };

            let (face, endpoint) = match lock_peers(&self.peers).get(&addr) {
                Some(&face) => (face, None),
                None => (self.multicast_face, Some(EndpointId::Udp(addr))),
            };
            if self
                .events_tx
                .send(FwEvent::Packet {
                    face,
                    endpoint,
                    packet,
                })
                .is_err()
            {
                info!("forwarding loop gone, stopping UDP driver");
                return;
            }
        }
    }
}
