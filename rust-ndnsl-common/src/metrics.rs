//! Metrics collection for the self-learning forwarder.
//!
//! Counters are plain atomics so they can be bumped from the forwarding
//! loop, the RIB loop and the transport tasks without coordination.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for the forwarder
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct FwdMetrics {
    // Packet processing
    pub interests_received: Counter,
    pub interests_suppressed: Counter,
    pub interests_forwarded: Counter,
    pub discovery_broadcasts: Counter,
    pub data_received: Counter,
    pub data_sent: Counter,
    pub data_unsolicited: Counter,
    pub nacks_received: Counter,
    pub nacks_sent: Counter,

    // Tables
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub pit_inserts: Counter,
    pub pit_expirations: Counter,
    pub pit_size: Gauge,
    pub fib_size: Gauge,

    // Self-learning
    pub pa_lookups: Counter,
    pub pa_attached: Counter,
    pub routes_announced: Counter,
    pub routes_renewed: Counter,
    pub routes_retired: Counter,
    pub faces_created: Counter,
}

impl FwdMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
