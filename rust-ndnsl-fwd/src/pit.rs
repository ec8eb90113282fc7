//! Pending Interest Table.
//!
//! PIT entries are shared as `Arc` so strategy continuations can hold weak
//! references across the RIB round trip; the interior state sits behind a
//! mutex that only the forwarding loop ever contends for. Accessors hand
//! out snapshots and apply targeted mutations so callers never hold the
//! lock across forwarder operations.

use crate::face::Face;
use crate::strategy::retx_suppression::RetxInfo;
use rust_ndnsl_common::lp::NackReason;
use rust_ndnsl_common::ndn::{Interest, Name};
use rust_ndnsl_common::types::FaceId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Strategy state attached to an in-record: whether the downstream sent a
/// discovery or non-discovery Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InRecordInfo {
    pub is_non_discovery: bool,
}

/// Strategy state attached to an out-record: whether the Interest we sent
/// upstream was discovery or non-discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutRecordInfo {
    pub is_non_discovery: bool,
}

/// One downstream that asked for this name.
#[derive(Debug, Clone)]
pub struct InRecord {
    pub face: Arc<Face>,
    pub nonce: u32,
    pub expiry: Instant,
    pub info: Option<InRecordInfo>,
}

/// One upstream this Interest was sent to.
#[derive(Debug, Clone)]
pub struct OutRecord {
    pub face: Arc<Face>,
    pub last_send: Instant,
    pub expiry: Instant,
    pub nacked: Option<NackReason>,
    pub info: Option<OutRecordInfo>,
}

#[derive(Debug)]
struct PitState {
    interest: Interest,
    in_records: Vec<InRecord>,
    out_records: Vec<OutRecord>,
    expiry: Instant,
    retx: Option<RetxInfo>,
}

/// A pending Interest.
#[derive(Debug)]
pub struct PitEntry {
    name: Name,
    can_be_prefix: bool,
    state: Mutex<PitState>,
}

impl PitEntry {
    pub fn new(interest: Interest, now: Instant) -> Self {
        let expiry = now + interest.lifetime();
        Self {
            name: interest.name().clone(),
            can_be_prefix: interest.can_be_prefix,
            state: Mutex::new(PitState {
                interest,
                in_records: Vec::new(),
                out_records: Vec::new(),
                expiry,
                retx: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn can_be_prefix(&self) -> bool {
        self.can_be_prefix
    }

    /// A copy of the aggregated Interest (the first one received).
    pub fn interest(&self) -> Interest {
        self.state().interest.clone()
    }

    /* -------------------------- expiry -------------------------- */

    pub fn expiry(&self) -> Instant {
        self.state().expiry
    }

    pub fn set_expiry(&self, at: Instant) {
        self.state().expiry = at;
    }

    /// Moves the expiry later, never earlier.
    pub fn extend_expiry(&self, at: Instant) {
        let mut state = self.state();
        if at > state.expiry {
            state.expiry = at;
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.state().expiry <= now
    }

    /* ------------------------ in-records ------------------------ */

    pub fn insert_or_update_in_record(&self, face: &Arc<Face>, interest: &Interest, now: Instant) {
        let expiry = now + interest.lifetime();
        let mut state = self.state();
        match state
            .in_records
            .iter_mut()
            .find(|record| record.face.id() == face.id())
        {
            Some(record) => {
                record.nonce = interest.nonce;
                record.expiry = expiry;
            }
            None => state.in_records.push(InRecord {
                face: face.clone(),
                nonce: interest.nonce,
                expiry,
                info: None,
            }),
        }
        if expiry > state.expiry {
            state.expiry = expiry;
        }
    }

    pub fn in_record(&self, face: FaceId) -> Option<InRecord> {
        self.state()
            .in_records
            .iter()
            .find(|record| record.face.id() == face)
            .cloned()
    }

    pub fn in_records(&self) -> Vec<InRecord> {
        self.state().in_records.clone()
    }

    pub fn first_in_face(&self) -> Option<Arc<Face>> {
        self.state()
            .in_records
            .first()
            .map(|record| record.face.clone())
    }

    pub fn set_in_record_info(&self, face: FaceId, info: InRecordInfo) -> bool {
        let mut state = self.state();
        match state
            .in_records
            .iter_mut()
            .find(|record| record.face.id() == face)
        {
            Some(record) => {
                record.info = Some(info);
                true
            }
            None => false,
        }
    }

    pub fn delete_in_record(&self, face: FaceId) {
        self.state().in_records.retain(|record| record.face.id() != face);
    }

    pub fn clear_in_records(&self) {
        self.state().in_records.clear();
    }

    /* ----------------------- out-records ------------------------ */

    pub fn insert_or_update_out_record(&self, face: &Arc<Face>, interest: &Interest, now: Instant) {
        let expiry = now + interest.lifetime();
        let mut state = self.state();
        match state
            .out_records
            .iter_mut()
            .find(|record| record.face.id() == face.id())
        {
            Some(record) => {
                record.last_send = now;
                record.expiry = expiry;
                record.nacked = None;
            }
            None => state.out_records.push(OutRecord {
                face: face.clone(),
                last_send: now,
                expiry,
                nacked: None,
                info: None,
            }),
        }
    }

    pub fn out_record(&self, face: FaceId) -> Option<OutRecord> {
        self.state()
            .out_records
            .iter()
            .find(|record| record.face.id() == face)
            .cloned()
    }

    pub fn out_records(&self) -> Vec<OutRecord> {
        self.state().out_records.clone()
    }

    pub fn set_out_record_info(&self, face: FaceId, info: OutRecordInfo) -> bool {
        let mut state = self.state();
        match state
            .out_records
            .iter_mut()
            .find(|record| record.face.id() == face)
        {
            Some(record) => {
                record.info = Some(info);
                true
            }
            None => false,
        }
    }

    pub fn set_out_record_nacked(&self, face: FaceId, reason: NackReason) -> bool {
        let mut state = self.state();
        match state
            .out_records
            .iter_mut()
            .find(|record| record.face.id() == face)
        {
            Some(record) => {
                record.nacked = Some(reason);
                true
            }
            None => false,
        }
    }

    /// Whether some upstream may still answer: an unexpired out-record that
    /// has not been nacked.
    pub fn has_pending_out_records(&self, now: Instant) -> bool {
        self.state()
            .out_records
            .iter()
            .any(|record| record.expiry > now && record.nacked.is_none())
    }

    /// The most recent send time over all out-records.
    pub fn last_outgoing(&self) -> Option<Instant> {
        self.state()
            .out_records
            .iter()
            .map(|record| record.last_send)
            .max()
    }

    /* ----------------- retransmission suppressor ---------------- */

    pub fn retx_info(&self) -> Option<RetxInfo> {
        self.state().retx
    }

    pub fn set_retx_info(&self, info: RetxInfo) {
        self.state().retx = Some(info);
    }
}

/// The table of pending Interests, keyed by (name, can_be_prefix).
#[derive(Debug, Default)]
pub struct Pit {
    entries: HashMap<(Name, bool), Arc<PitEntry>>,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds or creates the entry for `interest`. Returns the entry and
    /// whether it was newly created.
    pub fn insert(&mut self, interest: &Interest, now: Instant) -> (Arc<PitEntry>, bool) {
        let key = (interest.name().clone(), interest.can_be_prefix);
        match self.entries.get(&key) {
            Some(entry) => (entry.clone(), false),
            None => {
                let entry = Arc::new(PitEntry::new(interest.clone(), now));
                self.entries.insert(key, entry.clone());
                (entry, true)
            }
        }
    }

    pub fn find(&self, name: &Name, can_be_prefix: bool) -> Option<Arc<PitEntry>> {
        self.entries
            .get(&(name.clone(), can_be_prefix))
            .cloned()
    }

    /// All entries a Data packet with `name` satisfies.
    pub fn find_matches(&self, name: &Name) -> Vec<Arc<PitEntry>> {
        self.entries
            .values()
            .filter(|entry| {
                if entry.can_be_prefix() {
                    entry.name().is_prefix_of(name)
                } else {
                    entry.name() == name
                }
            })
            .cloned()
            .collect()
    }

    /// Drops expired entries, returning how many were removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
