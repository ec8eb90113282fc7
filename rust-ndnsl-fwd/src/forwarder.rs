//! The forwarder: tables plus the operations the strategy layer consumes.

use crate::cs::Cs;
use crate::face::{Face, FaceTable};
use crate::fib::{Fib, FibEntry};
use crate::pit::{Pit, PitEntry};
use log::{debug, trace, warn};
use rust_ndnsl_common::lp::{Nack, NackReason, NdnPacket};
use rust_ndnsl_common::metrics::FwdMetrics;
use rust_ndnsl_common::ndn::{Data, Interest};
use rust_ndnsl_common::types::{FaceId, FaceScope, FibUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default content store capacity.
pub const DEFAULT_CS_CAPACITY: usize = 4096;

/// Checks whether forwarding `interest` from `in_face` out of `out_face`
/// would leave its name scope.
///
/// `/localhost` names never cross to non-local faces; `/localhop` names may
/// cross one non-local hop only when the downstream is local.
pub fn would_violate_scope(in_face: &Face, interest: &Interest, out_face: &Face) -> bool {
    if out_face.scope() == FaceScope::Local {
        return false;
    }
    let first = interest.name().get(0).map(|c| c.as_bytes().as_ref());
    if first == Some(b"localhost".as_ref()) {
        return true;
    }
    if first == Some(b"localhop".as_ref()) {
        return in_face.scope() != FaceScope::Local;
    }
    false
}

/// Owns the face table, PIT, FIB and content store. Lives on the
/// forwarding loop; strategy triggers and posted continuations receive a
/// mutable reference.
pub struct Forwarder {
    faces: FaceTable,
    pit: Pit,
    fib: Fib,
    cs: Cs,
    metrics: Arc<FwdMetrics>,
}

impl Forwarder {
    pub fn new(metrics: Arc<FwdMetrics>) -> Self {
        Self::with_cs_capacity(metrics, DEFAULT_CS_CAPACITY)
    }

    pub fn with_cs_capacity(metrics: Arc<FwdMetrics>, cs_capacity: usize) -> Self {
        Self {
            faces: FaceTable::new(),
            pit: Pit::new(),
            fib: Fib::new(),
            cs: Cs::new(cs_capacity),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<FwdMetrics> {
        &self.metrics
    }

    /* ------------------------- tables --------------------------- */

    pub fn face_table(&self) -> &FaceTable {
        &self.faces
    }

    pub fn add_face(&mut self, face: Face) -> Arc<Face> {
        let face = self.faces.add(face);
        debug!("[Face {}] added ({:?}, {:?})", face.id(), face.scope(), face.link_type());
        self.metrics.faces_created.increment();
        face
    }

    pub fn get_face(&self, id: FaceId) -> Option<Arc<Face>> {
        self.faces.get(id)
    }

    pub fn remove_face(&mut self, id: FaceId) {
        if self.faces.remove(id).is_some() {
            debug!("[Face {id}] removed");
        }
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn pit_mut(&mut self) -> &mut Pit {
        &mut self.pit
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn fib_mut(&mut self) -> &mut Fib {
        &mut self.fib
    }

    pub fn cs(&self) -> &Cs {
        &self.cs
    }

    pub fn cs_mut(&mut self) -> &mut Cs {
        &mut self.cs
    }

    /// Applies a route change produced by the RIB service.
    pub fn apply_fib_update(&mut self, update: FibUpdate) {
        match update {
            FibUpdate::Add { name, face, cost } => match self.get_face(face) {
                Some(face) => self.fib.insert(name, face, cost),
                None => warn!("FIB update for unknown face={face}, ignored"),
            },
            FibUpdate::Remove { name, face } => self.fib.remove(&name, face),
        }
        self.metrics.fib_size.set(self.fib.len() as u64);
    }

    /* -------------------- strategy operations ------------------- */

    /// Longest-prefix FIB match for the entry's name; an empty entry when
    /// there is no match.
    pub fn lookup_fib(&self, entry: &PitEntry) -> FibEntry {
        self.fib
            .longest_prefix_match(entry.name())
            .cloned()
            .unwrap_or_else(FibEntry::empty)
    }

    /// Sends `interest` on `face`, recording the out-record first.
    pub fn send_interest(&mut self, entry: &Arc<PitEntry>, face: &Arc<Face>, interest: &Interest) {
        let now = Instant::now();
        entry.insert_or_update_out_record(face, interest, now);
        trace!("[Face {}] send {}", face.id(), interest);
        face.send(NdnPacket::Interest(interest.clone()));
        self.metrics.interests_forwarded.increment();
    }

    /// Delivers `data` to one downstream, consuming its in-record.
    pub fn send_data(&mut self, entry: &Arc<PitEntry>, face: &Arc<Face>, data: &Data) {
        entry.delete_in_record(face.id());
        trace!("[Face {}] send {}", face.id(), data);
        face.send(NdnPacket::Data(data.clone()));
        self.metrics.data_sent.increment();
        if entry.in_records().is_empty() {
            entry.set_expiry(Instant::now());
        }
    }

    /// Delivers `data` to every unexpired downstream except `exclude`,
    /// then satisfies the entry.
    pub fn send_data_to_all(
        &mut self,
        entry: &Arc<PitEntry>,
        exclude: Option<FaceId>,
        data: &Data,
    ) {
        let now = Instant::now();
        let downstreams: Vec<Arc<Face>> = entry
            .in_records()
            .into_iter()
            .filter(|record| record.expiry > now)
            .filter(|record| Some(record.face.id()) != exclude)
            .map(|record| record.face)
            .collect();

        for face in downstreams {
            trace!("[Face {}] send {}", face.id(), data);
            face.send(NdnPacket::Data(data.clone()));
            self.metrics.data_sent.increment();
        }

        entry.clear_in_records();
        entry.set_expiry(now);
    }

    /// Sends a Nack with `reason` to `face`, consuming its in-record.
    pub fn send_nack(&mut self, entry: &Arc<PitEntry>, face: &Arc<Face>, reason: NackReason) {
        let mut interest = entry.interest();
        if let Some(record) = entry.in_record(face.id()) {
            interest = interest.with_nonce(record.nonce);
        }
        entry.delete_in_record(face.id());
        trace!("[Face {}] send Nack({reason}, {})", face.id(), interest.name());
        face.send(NdnPacket::Nack(Nack::new(reason, interest)));
        self.metrics.nacks_sent.increment();
    }

    /// Marks the entry unusable; it is reclaimed on the next sweep.
    pub fn reject_pending_interest(&mut self, entry: &Arc<PitEntry>) {
        entry.set_expiry(Instant::now());
    }

    /// Re-arms the entry's expiry timer to `duration` from now.
    pub fn set_expiry_timer(&mut self, entry: &Arc<PitEntry>, duration: Duration) {
        entry.set_expiry(Instant::now() + duration);
    }

    /// See [`would_violate_scope`].
    pub fn would_violate_scope(
        &self,
        in_face: &Face,
        interest: &Interest,
        out_face: &Face,
    ) -> bool {
        would_violate_scope(in_face, interest, out_face)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndnsl_common::ndn::Name;
    use rust_ndnsl_common::types::LinkType;
    use tokio::sync::mpsc;

    fn forwarder() -> Forwarder {
        Forwarder::new(Arc::new(FwdMetrics::new()))
    }

    fn add_face(
        fw: &mut Forwarder,
        scope: FaceScope,
    ) -> (Arc<Face>, mpsc::UnboundedReceiver<NdnPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (fw.add_face(Face::new(scope, LinkType::PointToPoint, tx)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn scope_rules() {
        let mut fw = forwarder();
        let (local, _rx1) = add_face(&mut fw, FaceScope::Local);
        let (remote, _rx2) = add_face(&mut fw, FaceScope::NonLocal);
        let (remote2, _rx3) = add_face(&mut fw, FaceScope::NonLocal);

        let plain = Interest::new(Name::from_string("/a").unwrap());
        let localhost = Interest::new(Name::from_string("/localhost/x").unwrap());
        let localhop = Interest::new(Name::from_string("/localhop/x").unwrap());

        assert!(!would_violate_scope(&local, &plain, &remote));
        assert!(would_violate_scope(&local, &localhost, &remote));
        assert!(!would_violate_scope(&remote, &localhost, &local));
        assert!(!would_violate_scope(&local, &localhop, &remote));
        assert!(would_violate_scope(&remote, &localhop, &remote2));
    }

    #[tokio::test(start_paused = true)]
    async fn send_interest_records_out_record() {
        let mut fw = forwarder();
        let (downstream, _rx_down) = add_face(&mut fw, FaceScope::Local);
        let (upstream, mut rx_up) = add_face(&mut fw, FaceScope::NonLocal);

        let interest = Interest::new(Name::from_string("/a").unwrap()).with_nonce(3);
        let now = Instant::now();
        let (entry, _) = fw.pit_mut().insert(&interest, now);
        entry.insert_or_update_in_record(&downstream, &interest, now);

        fw.send_interest(&entry, &upstream, &interest);
        assert!(entry.out_record(upstream.id()).is_some());
        assert!(matches!(rx_up.try_recv().unwrap(), NdnPacket::Interest(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn send_data_to_all_excludes_ingress_and_satisfies() {
        let mut fw = forwarder();
        let (a, mut rx_a) = add_face(&mut fw, FaceScope::Local);
        let (b, mut rx_b) = add_face(&mut fw, FaceScope::NonLocal);
        let (upstream, _rx_up) = add_face(&mut fw, FaceScope::NonLocal);

        let interest = Interest::new(Name::from_string("/a").unwrap());
        let now = Instant::now();
        let (entry, _) = fw.pit_mut().insert(&interest, now);
        entry.insert_or_update_in_record(&a, &interest, now);
        entry.insert_or_update_in_record(&b, &interest, now);

        let data = Data::new(Name::from_string("/a").unwrap(), &b"x"[..]);
        fw.send_data_to_all(&entry, Some(upstream.id()), &data);

        assert!(matches!(rx_a.try_recv().unwrap(), NdnPacket::Data(_)));
        assert!(matches!(rx_b.try_recv().unwrap(), NdnPacket::Data(_)));
        assert!(entry.in_records().is_empty());
        assert!(entry.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn send_nack_uses_downstream_nonce() {
        let mut fw = forwarder();
        let (downstream, mut rx) = add_face(&mut fw, FaceScope::Local);

        let interest = Interest::new(Name::from_string("/a").unwrap()).with_nonce(1);
        let now = Instant::now();
        let (entry, _) = fw.pit_mut().insert(&interest, now);
        let retx = interest.clone().with_nonce(99);
        entry.insert_or_update_in_record(&downstream, &retx, now);

        fw.send_nack(&entry, &downstream, NackReason::NoRoute);
        match rx.try_recv().unwrap() {
            NdnPacket::Nack(nack) => {
                assert_eq!(nack.reason, NackReason::NoRoute);
                assert_eq!(nack.interest.nonce, 99);
            }
            other => panic!("unexpected packet {other:?}"),
        }
        assert!(entry.in_record(downstream.id()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn fib_updates_resolve_faces() {
        let mut fw = forwarder();
        let (face, _rx) = add_face(&mut fw, FaceScope::NonLocal);

        fw.apply_fib_update(FibUpdate::Add {
            name: Name::from_string("/a").unwrap(),
            face: face.id(),
            cost: 5,
        });
        assert_eq!(fw.fib().len(), 1);

        // Updates for unknown faces are dropped.
        fw.apply_fib_update(FibUpdate::Add {
            name: Name::from_string("/b").unwrap(),
            face: FaceId(99),
            cost: 5,
        });
        assert_eq!(fw.fib().len(), 1);

        fw.apply_fib_update(FibUpdate::Remove {
            name: Name::from_string("/a").unwrap(),
            face: face.id(),
        });
        assert!(fw.fib().is_empty());
    }
}
