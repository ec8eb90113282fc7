//! Exponential retransmission suppression.
//!
//! Classifies each incoming Interest against its PIT entry: NEW when no
//! upstream is pending, SUPPRESS when the last forward is still inside the
//! current suppression interval, FORWARD otherwise. Each permitted
//! retransmission doubles the interval up to the cap.

use crate::pit::PitEntry;
use std::time::Duration;
use tokio::time::Instant;

pub const RETX_SUPPRESSION_INITIAL: Duration = Duration::from_millis(10);
pub const RETX_SUPPRESSION_MAX: Duration = Duration::from_millis(250);
pub const DEFAULT_MULTIPLIER: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetxSuppressionResult {
    /// The PIT entry has no pending upstream; treat as a fresh Interest.
    New,
    /// Outside the suppression interval; permit the retransmission.
    Forward,
    /// Inside the suppression interval; drop.
    Suppress,
}

/// Suppressor state stored on the PIT entry.
#[derive(Debug, Clone, Copy)]
pub struct RetxInfo {
    pub suppression_interval: Duration,
    /// Retransmissions permitted so far on this entry.
    pub retx_count: u32,
}

pub struct RetxSuppressionExponential {
    initial: Duration,
    max: Duration,
    multiplier: u32,
}

impl RetxSuppressionExponential {
    pub fn new(initial: Duration, max: Duration, multiplier: u32) -> Self {
        Self {
            initial,
            max,
            multiplier,
        }
    }

    pub fn decide(&self, entry: &PitEntry, now: Instant) -> RetxSuppressionResult {
        if !entry.has_pending_out_records(now) {
            return RetxSuppressionResult::New;
        }

        let Some(last_outgoing) = entry.last_outgoing() else {
            return RetxSuppressionResult::New;
        };

        let mut info = entry.retx_info().unwrap_or(RetxInfo {
            suppression_interval: self.initial,
            retx_count: 0,
        });

        if now.duration_since(last_outgoing) < info.suppression_interval {
            entry.set_retx_info(info);
            return RetxSuppressionResult::Suppress;
        }

        info.suppression_interval = (info.suppression_interval * self.multiplier).min(self.max);
        info.retx_count += 1;
        entry.set_retx_info(info);
        RetxSuppressionResult::Forward
    }
}

impl Default for RetxSuppressionExponential {
    fn default() -> Self {
        Self::new(RETX_SUPPRESSION_INITIAL, RETX_SUPPRESSION_MAX, DEFAULT_MULTIPLIER)
    }
}
