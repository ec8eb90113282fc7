//! Next-hop selection helpers shared by strategies.

use crate::face::Face;
use crate::fib::NextHop;
use crate::forwarder::would_violate_scope;
use crate::pit::PitEntry;
use rust_ndnsl_common::ndn::Interest;
use rust_ndnsl_common::types::LinkType;
use tokio::time::Instant;

/// Whether `nexthop` may carry `interest` arriving from `in_face`.
///
/// A next-hop is ineligible when it points back at the ingress (unless the
/// link is ad hoc), when forwarding there would violate the name scope, or
/// — with `want_unused` — when it already carries an unexpired out-record.
pub fn is_next_hop_eligible(
    in_face: &Face,
    interest: &Interest,
    nexthop: &NextHop,
    entry: &PitEntry,
    want_unused: bool,
    now: Instant,
) -> bool {
    let out_face = &nexthop.face;

    if out_face.id() == in_face.id() && out_face.link_type() != LinkType::AdHoc {
        return false;
    }
    if would_violate_scope(in_face, interest, out_face) {
        return false;
    }
    if want_unused {
        if let Some(out_record) = entry.out_record(out_face.id()) {
            if out_record.expiry > now {
                return false;
            }
        }
    }
    true
}

/// Among eligible next-hops that have been tried, the one whose out-record
/// was sent on longest ago.
pub fn find_eligible_nexthop_with_earliest_out_record<'a>(
    in_face: &Face,
    interest: &Interest,
    next_hops: &'a [NextHop],
    entry: &PitEntry,
    now: Instant,
) -> Option<&'a NextHop> {
    let mut found = None;
    let mut earliest: Option<Instant> = None;

    for nexthop in next_hops {
        if !is_next_hop_eligible(in_face, interest, nexthop, entry, false, now) {
            continue;
        }
        let Some(out_record) = entry.out_record(nexthop.face.id()) else {
            continue;
        };
        if earliest.map_or(true, |instant| out_record.last_send < instant) {
            earliest = Some(out_record.last_send);
            found = Some(nexthop);
        }
    }

    found
}
