//! Forwarding Information Base.
//!
//! Maps name prefixes to next-hop lists ordered by ascending cost. Entries
//! come from the RIB service (announced and static routes) through
//! `FibUpdate` messages applied on the forwarding loop.

use crate::face::Face;
use rust_ndnsl_common::ndn::Name;
use rust_ndnsl_common::types::FaceId;
use std::collections::HashMap;
use std::sync::Arc;

/// One candidate upstream for a prefix.
#[derive(Debug, Clone)]
pub struct NextHop {
    pub face: Arc<Face>,
    pub cost: u32,
}

/// A FIB entry: a prefix and its cost-ordered next-hops.
#[derive(Debug, Clone)]
pub struct FibEntry {
    pub prefix: Name,
    pub next_hops: Vec<NextHop>,
}

impl FibEntry {
    pub fn empty() -> Self {
        Self {
            prefix: Name::new(),
            next_hops: Vec::new(),
        }
    }

    pub fn has_next_hops(&self) -> bool {
        !self.next_hops.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Fib {
    entries: HashMap<Name, FibEntry>,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or updates a next-hop, keeping the list sorted by cost.
    pub fn insert(&mut self, prefix: Name, face: Arc<Face>, cost: u32) {
        let entry = self
            .entries
            .entry(prefix.clone())
            .or_insert_with(|| FibEntry {
                prefix,
                next_hops: Vec::new(),
            });
        match entry
            .next_hops
            .iter_mut()
            .find(|hop| hop.face.id() == face.id())
        {
            Some(hop) => hop.cost = cost,
            None => entry.next_hops.push(NextHop { face, cost }),
        }
        entry.next_hops.sort_by_key(|hop| hop.cost);
    }

    /// Removes the next-hop for `face`; drops the entry when it empties.
    pub fn remove(&mut self, prefix: &Name, face: FaceId) {
        if let Some(entry) = self.entries.get_mut(prefix) {
            entry.next_hops.retain(|hop| hop.face.id() != face);
            if entry.next_hops.is_empty() {
                self.entries.remove(prefix);
            }
        }
    }

    /// Longest-prefix match for `name`.
    pub fn longest_prefix_match(&self, name: &Name) -> Option<&FibEntry> {
        for len in (0..=name.len()).rev() {
            if let Some(entry) = self.entries.get(&name.prefix(len)) {
                return Some(entry);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
