//! Content store.
//!
//! An exact-match cache with FIFO eviction, just large enough to drive the
//! content-store-hit trigger of the strategy layer. Link-protocol tags are
//! hop-by-hop and are stripped before a Data is stored.

use rust_ndnsl_common::ndn::{Data, Interest, Name};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct CsEntry {
    data: Data,
    fresh_until: Instant,
}

#[derive(Debug)]
pub struct Cs {
    entries: HashMap<Name, CsEntry>,
    queue: VecDeque<Name>,
    capacity: usize,
}

impl Cs {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Caches a Data packet, evicting the oldest entry when full.
    pub fn insert(&mut self, mut data: Data, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        data.tags_mut().set_non_discovery(false);
        data.tags_mut().clear_prefix_ann();

        let fresh_until = now + Duration::from_millis(data.freshness_ms as u64);
        let name = data.name().clone();
        if self.entries.insert(name.clone(), CsEntry { data, fresh_until }).is_none() {
            self.queue.push_back(name);
        }

        while self.entries.len() > self.capacity {
            match self.queue.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Looks up a Data packet satisfying `interest`.
    pub fn find(&self, interest: &Interest, now: Instant) -> Option<Data> {
        let entry = if interest.can_be_prefix {
            self.entries
                .iter()
                .filter(|(name, _)| interest.name().is_prefix_of(name))
                .map(|(_, entry)| entry)
                .next()
        } else {
            self.entries.get(interest.name())
        }?;

        if interest.must_be_fresh && entry.fresh_until <= now {
            return None;
        }
        Some(entry.data.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str) -> Data {
        Data::new(Name::from_string(name).unwrap(), &b"payload"[..])
    }

    #[tokio::test(start_paused = true)]
    async fn exact_match_hit_and_miss() {
        let mut cs = Cs::new(8);
        let now = Instant::now();
        cs.insert(data("/a/b"), now);

        let hit = Interest::new(Name::from_string("/a/b").unwrap());
        assert!(cs.find(&hit, now).is_some());
        let miss = Interest::new(Name::from_string("/a").unwrap());
        assert!(cs.find(&miss, now).is_none());

        let prefix = Interest::new(Name::from_string("/a").unwrap()).with_can_be_prefix(true);
        assert!(cs.find(&prefix, now).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn must_be_fresh_respects_freshness_period() {
        let mut cs = Cs::new(8);
        let now = Instant::now();
        cs.insert(data("/a").with_freshness(100), now);

        tokio::time::advance(Duration::from_millis(200)).await;
        let later = Instant::now();
        let fresh = Interest::new(Name::from_string("/a").unwrap()).with_must_be_fresh(true);
        assert!(cs.find(&fresh, later).is_none());
        let stale_ok = Interest::new(Name::from_string("/a").unwrap());
        assert!(cs.find(&stale_ok, later).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn fifo_eviction() {
        let mut cs = Cs::new(2);
        let now = Instant::now();
        cs.insert(data("/1"), now);
        cs.insert(data("/2"), now);
        cs.insert(data("/3"), now);
        assert_eq!(cs.len(), 2);
        assert!(cs
            .find(&Interest::new(Name::from_string("/1").unwrap()), now)
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn tags_are_stripped_on_insert() {
        use rust_ndnsl_common::announcement::PrefixAnnouncement;

        let mut cs = Cs::new(2);
        let now = Instant::now();
        let mut tagged = data("/a");
        tagged.tags_mut().set_prefix_ann(PrefixAnnouncement::new(
            Name::from_string("/a").unwrap(),
            Duration::from_secs(1),
        ));
        cs.insert(tagged, now);

        let found = cs
            .find(&Interest::new(Name::from_string("/a").unwrap()), now)
            .unwrap();
        assert!(found.tags().prefix_ann().is_none());
    }
}
