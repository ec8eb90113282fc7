//! Self-learning forwarding strategy.
//!
//! Forwards Interests along ranked next-hops with retransmission
//! suppression. When the FIB has no usable next-hop, a discovery Interest
//! is broadcast to non-local faces; Data answering a discovery Interest
//! carries a Prefix Announcement which is turned into a route on the face
//! the Data arrived on (or on a freshly created unicast face when it
//! arrived over a multi-access link). `NoRoute` Nacks retire the offending
//! route and fall back to an untried next-hop or to a fresh discovery.

use crate::bridge::RibBridge;
use crate::face::{Face, FaceEndpoint};
use crate::forwarder::{would_violate_scope, Forwarder};
use crate::pit::{InRecordInfo, OutRecordInfo, PitEntry};
use crate::strategy::algorithm::{
    find_eligible_nexthop_with_earliest_out_record, is_next_hop_eligible,
};
use crate::strategy::retx_suppression::{
    RetxSuppressionExponential, RetxSuppressionResult, DEFAULT_MULTIPLIER,
};
use crate::strategy::{parse_instance_name, process_nack, Strategy, StrategyError};
use log::debug;
use rust_ndnsl_common::announcement::PrefixAnnouncement;
use rust_ndnsl_common::lp::{Nack, NackReason};
use rust_ndnsl_common::ndn::{Data, Interest, Name, NameComponent};
use rust_ndnsl_common::types::{FaceId, FacePersistency, FaceScope, LinkType};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Tunables outside the conformance surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfLearningOptions {
    /// After [`SelfLearningStrategy::RETX_TRIGGER_BROADCAST_COUNT`]
    /// permitted retransmissions on one PIT entry, retire the routes that
    /// entry tried and restart discovery. Off by default.
    pub retx_triggers_broadcast: bool,
}

pub struct SelfLearningStrategy {
    instance_name: Name,
    bridge: RibBridge,
    retx_suppression: RetxSuppressionExponential,
    options: SelfLearningOptions,
}

impl SelfLearningStrategy {
    /// Lifetime granted to routes installed from a Prefix Announcement.
    pub const ROUTE_RENEW_LIFETIME: Duration = Duration::from_secs(600);
    pub const RETX_SUPPRESSION_INITIAL: Duration = Duration::from_millis(10);
    pub const RETX_SUPPRESSION_MAX: Duration = Duration::from_millis(250);
    pub const RETX_TRIGGER_BROADCAST_COUNT: u32 = 7;

    const VERSION: u64 = 2;

    /// The versioned registry name of this strategy.
    pub fn strategy_name() -> Name {
        let mut name = Name::new();
        for part in ["localhost", "nfd", "strategy", "self-learning"] {
            name.push(NameComponent::new(part.as_bytes().to_vec()));
        }
        name.append_version(Self::VERSION)
    }

    pub fn new(instance_name: Name, bridge: RibBridge) -> Result<Self, StrategyError> {
        let base = Self::strategy_name().prefix(4);
        let parsed = parse_instance_name(&instance_name, &base)?;
        if !parsed.parameters.is_empty() {
            return Err(StrategyError::UnexpectedParameters("self-learning"));
        }
        if let Some(version) = parsed.version {
            if version != Self::VERSION {
                return Err(StrategyError::UnsupportedVersion("self-learning", version));
            }
        }

        Ok(Self {
            instance_name: Self::strategy_name(),
            bridge,
            retx_suppression: RetxSuppressionExponential::new(
                Self::RETX_SUPPRESSION_INITIAL,
                Self::RETX_SUPPRESSION_MAX,
                DEFAULT_MULTIPLIER,
            ),
            options: SelfLearningOptions::default(),
        })
    }

    pub fn with_options(mut self, options: SelfLearningOptions) -> Self {
        self.options = options;
        self
    }

    /* ---------------------- Interest handlers -------------------- */

    /// Sends the Interest to every permissible face except the ingress.
    ///
    /// Faces are skipped when they are local, when sending would violate
    /// the name scope, or when they are the ingress itself on a
    /// non-ad-hoc link. The outgoing Interest stays a discovery Interest.
    fn broadcast_interest(
        &self,
        fw: &mut Forwarder,
        interest: &Interest,
        in_face: &Arc<Face>,
        entry: &Arc<PitEntry>,
    ) {
        let mut outgoing = interest.clone();
        outgoing.tags_mut().set_non_discovery(false);

        let candidates: Vec<Arc<Face>> = fw.face_table().iter().rev().cloned().collect();
        for out_face in candidates {
            if (out_face.id() == in_face.id() && out_face.link_type() != LinkType::AdHoc)
                || would_violate_scope(in_face, &outgoing, &out_face)
                || out_face.scope() == FaceScope::Local
            {
                continue;
            }
            debug!(
                "{} from={} send discovery to={}",
                outgoing,
                in_face.id(),
                out_face.id()
            );
            fw.send_interest(entry, &out_face, &outgoing);
            entry.set_out_record_info(
                out_face.id(),
                OutRecordInfo {
                    is_non_discovery: false,
                },
            );
        }
        fw.metrics().discovery_broadcasts.increment();
    }

    fn no_nexthop_handler(
        &self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        interest: &Interest,
        entry: &Arc<PitEntry>,
    ) {
        let is_non_discovery = interest.tags().has_non_discovery();
        entry.set_in_record_info(ingress.face.id(), InRecordInfo { is_non_discovery });

        if is_non_discovery {
            // A non-discovery Interest promises a route; tell the
            // downstream its route is stale.
            debug!("{interest} from={ingress} noNextHop, send no-route Nack");
            fw.send_nack(entry, &ingress.face, NackReason::NoRoute);
            fw.reject_pending_interest(entry);
        } else {
            debug!("No next hop found, broadcast {interest}");
            self.broadcast_interest(fw, interest, &ingress.face, entry);
        }
    }

    fn all_nexthop_tried_handler(
        &self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        interest: &Interest,
        entry: &Arc<PitEntry>,
        next_hops: &[crate::fib::NextHop],
        now: Instant,
    ) {
        let Some(nexthop) = find_eligible_nexthop_with_earliest_out_record(
            &ingress.face,
            interest,
            next_hops,
            entry,
            now,
        ) else {
            debug!("{interest} from={ingress} retransmitNoNextHop");
            return;
        };
        let out_face = nexthop.face.clone();
        fw.send_interest(entry, &out_face, interest);
        debug!(
            "{interest} from={ingress} retransmit-retry-to face={}",
            out_face.id()
        );
    }

    fn has_untried_nexthop_handler(
        &self,
        fw: &mut Forwarder,
        in_face: &Arc<Face>,
        out_face: &Arc<Face>,
        interest: &Interest,
        entry: &Arc<PitEntry>,
    ) {
        let is_non_discovery = interest.tags().has_non_discovery();
        entry.set_in_record_info(in_face.id(), InRecordInfo { is_non_discovery });

        // With a usable FIB entry, forwarding is always non-discovery.
        let mut outgoing = interest.clone();
        if !is_non_discovery {
            outgoing.tags_mut().set_non_discovery(true);
        }
        fw.send_interest(entry, out_face, &outgoing);
        entry.set_out_record_info(
            out_face.id(),
            OutRecordInfo {
                is_non_discovery: true,
            },
        );
        debug!("Send {outgoing} to the untried face={}", out_face.id());
    }

    /// Optional reflood mode: retire the routes this entry tried and start
    /// discovery over.
    fn retx_broadcast_handler(
        &self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        interest: &Interest,
        entry: &Arc<PitEntry>,
    ) {
        debug!(
            "{interest} from={ingress} retransmitted {} times, restart discovery",
            Self::RETX_TRIGGER_BROADCAST_COUNT
        );
        for out_record in entry.out_records() {
            Self::post_renew(
                &self.bridge,
                interest.name().clone(),
                out_record.face.id(),
                Duration::ZERO,
            );
        }
        if let Some(mut info) = entry.retx_info() {
            info.retx_count = 0;
            entry.set_retx_info(info);
        }

        let is_non_discovery = interest.tags().has_non_discovery();
        entry.set_in_record_info(ingress.face.id(), InRecordInfo { is_non_discovery });
        self.broadcast_interest(fw, interest, &ingress.face, entry);
    }

    /* ------------------------ Data handlers ----------------------- */

    /// Finds a Prefix Announcement for the Data on the RIB thread and
    /// forwards the Data with the announcement attached back on the
    /// forwarding thread.
    fn async_process_data(
        &self,
        fw: &mut Forwarder,
        entry: &Arc<PitEntry>,
        in_face: &Arc<Face>,
        data: Data,
        exclude_ingress: bool,
    ) {
        // The entry must survive the cross-thread round trip; the expiry
        // timer is restored once the continuation has run.
        fw.set_expiry_timer(entry, Duration::from_secs(1));
        fw.metrics().pa_lookups.increment();

        let bridge = self.bridge.clone();
        let pit_weak = Arc::downgrade(entry);
        let in_face_id = in_face.id();
        self.bridge.run_on_rib(move |rib| {
            let name = data.name().clone();
            rib.sl_find_ann(&name, move |pa| {
                let Some(pa) = pa else {
                    // No announcement known; the PIT entry expires naturally.
                    return;
                };
                bridge.run_on_main(move |fw| {
                    let Some(entry) = pit_weak.upgrade() else {
                        debug!("PIT entry or face no longer exists");
                        return;
                    };
                    if fw.get_face(in_face_id).is_none() {
                        debug!("PIT entry or face no longer exists");
                        return;
                    }
                    debug!("Found PrefixAnnouncement={}", pa.prefix());
                    let mut data = data;
                    data.tags_mut().set_prefix_ann(pa);
                    fw.metrics().pa_attached.increment();
                    let exclude = exclude_ingress.then_some(in_face_id);
                    fw.send_data_to_all(&entry, exclude, &data);
                    fw.set_expiry_timer(&entry, Duration::ZERO);
                });
            });
        });
    }

    /// Whether returning Data must carry a Prefix Announcement: some
    /// unexpired downstream asked via discovery, and not all of them are
    /// local consumers.
    fn need_prefix_ann(entry: &PitEntry, now: Instant) -> bool {
        let mut has_discovery_interest = false;
        let mut direct_to_consumer = true;

        for in_record in entry.in_records() {
            if in_record.expiry <= now {
                continue;
            }
            if let Some(info) = in_record.info {
                if !info.is_non_discovery {
                    has_discovery_interest = true;
                }
            }
            if in_record.face.scope() != FaceScope::Local {
                direct_to_consumer = false;
            }
        }
        has_discovery_interest && !direct_to_consumer
    }

    /// Data with an announcement arrived over a multi-access link: open an
    /// on-demand unicast face to the sender, install the route on it, then
    /// deliver downstream. Delivery happens even when face creation fails.
    fn connect_unicast_and_add_route(
        &self,
        fw: &mut Forwarder,
        entry: &Arc<PitEntry>,
        ingress: &FaceEndpoint,
        data: &Data,
        pa: PrefixAnnouncement,
    ) {
        let (Some(channel), Some(endpoint)) =
            (ingress.face.channel().cloned(), ingress.endpoint.clone())
        else {
            debug!(
                "[Face {}] multi-access Data without channel or endpoint, deliver without route",
                ingress.face.id()
            );
            fw.send_data_to_all(entry, Some(ingress.face.id()), data);
            return;
        };

        debug!(
            "[Face {}] is multi-access, connect to unicast face at {endpoint}",
            ingress.face.id()
        );
        fw.set_expiry_timer(entry, Duration::from_secs(1));

        let bridge = self.bridge.clone();
        let pit_weak = Arc::downgrade(entry);
        let in_face_id = ingress.face.id();
        let data = data.clone();
        channel.connect(
            endpoint,
            FacePersistency::OnDemand,
            Box::new(move |fw, result| {
                let Some(entry) = pit_weak.upgrade() else {
                    debug!("PIT entry gone before unicast face creation settled");
                    return;
                };
                match result {
                    Ok(face) => {
                        debug!("unicast face created, add route");
                        Self::post_announce(&bridge, pa, face.id());
                    }
                    Err(reason) => {
                        debug!("unicast face creation failed, reason={reason}");
                    }
                }
                fw.send_data_to_all(&entry, Some(in_face_id), &data);
                fw.set_expiry_timer(&entry, Duration::ZERO);
            }),
        );
    }

    /* ------------------------- RIB calls -------------------------- */

    fn post_announce(bridge: &RibBridge, pa: PrefixAnnouncement, face: FaceId) {
        bridge.run_on_rib(move |rib| {
            rib.sl_announce(&pa, face, Self::ROUTE_RENEW_LIFETIME, move |result| {
                debug!("Add route via PrefixAnnouncement, result={result}");
            });
        });
    }

    fn post_renew(bridge: &RibBridge, name: Name, face: FaceId, max_lifetime: Duration) {
        bridge.run_on_rib(move |rib| {
            rib.sl_renew(&name, face, max_lifetime, move |result| {
                debug!("Renew route, result={result}");
            });
        });
    }

    /// This forwarder hosts the consumer: exactly one downstream and it is
    /// a local face.
    fn is_this_consumer(entry: &PitEntry) -> bool {
        let in_records = entry.in_records();
        in_records.len() == 1 && in_records[0].face.scope() == FaceScope::Local
    }
}

impl Strategy for SelfLearningStrategy {
    fn instance_name(&self) -> &Name {
        &self.instance_name
    }

    fn after_receive_interest(
        &mut self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        interest: &Interest,
        entry: &Arc<PitEntry>,
    ) {
        let now = Instant::now();
        let suppression = self.retx_suppression.decide(entry, now);
        if suppression == RetxSuppressionResult::Suppress {
            debug!("{interest} from={ingress} suppressed");
            fw.metrics().interests_suppressed.increment();
            return;
        }

        let fib_entry = fw.lookup_fib(entry);
        let next_hops = fib_entry.next_hops;

        if suppression == RetxSuppressionResult::New {
            // New Interest: lowest-cost eligible next-hop, or discovery.
            let chosen = next_hops
                .iter()
                .find(|nexthop| {
                    is_next_hop_eligible(&ingress.face, interest, nexthop, entry, false, now)
                })
                .cloned();
            match chosen {
                Some(nexthop) => self.has_untried_nexthop_handler(
                    fw,
                    &ingress.face,
                    &nexthop.face,
                    interest,
                    entry,
                ),
                None => self.no_nexthop_handler(fw, ingress, interest, entry),
            }
        } else {
            // Permitted retransmission.
            if self.options.retx_triggers_broadcast
                && entry
                    .retx_info()
                    .map_or(false, |info| info.retx_count >= Self::RETX_TRIGGER_BROADCAST_COUNT)
            {
                self.retx_broadcast_handler(fw, ingress, interest, entry);
                return;
            }

            let chosen = next_hops
                .iter()
                .find(|nexthop| {
                    is_next_hop_eligible(&ingress.face, interest, nexthop, entry, true, now)
                })
                .cloned();
            match chosen {
                Some(nexthop) => self.has_untried_nexthop_handler(
                    fw,
                    &ingress.face,
                    &nexthop.face,
                    interest,
                    entry,
                ),
                None => {
                    self.all_nexthop_tried_handler(fw, ingress, interest, entry, &next_hops, now)
                }
            }
        }
    }

    fn after_content_store_hit(
        &mut self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        data: &Data,
        entry: &Arc<PitEntry>,
    ) {
        let interest = entry.interest();
        let is_non_discovery = interest.tags().has_non_discovery();
        entry.set_in_record_info(ingress.face.id(), InRecordInfo { is_non_discovery });

        if ingress.face.scope() == FaceScope::Local {
            // The cache is answering a local consumer.
            fw.send_data(entry, &ingress.face, data);
            return;
        }

        if !is_non_discovery && data.tags().prefix_ann().is_none() {
            // A discovery Interest deserves an announcement with its Data.
            self.async_process_data(fw, entry, &ingress.face, data.clone(), false);
        } else {
            fw.send_data(entry, &ingress.face, data);
        }
    }

    fn after_receive_data(
        &mut self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        data: &Data,
        entry: &Arc<PitEntry>,
    ) {
        let Some(out_record) = entry.out_record(ingress.face.id()) else {
            debug!("{data} from={ingress} no-out-record");
            return;
        };

        let was_non_discovery = out_record
            .info
            .map_or(false, |info| info.is_non_discovery);

        if was_non_discovery {
            if !Self::need_prefix_ann(entry, Instant::now()) {
                fw.send_data_to_all(entry, Some(ingress.face.id()), data);
            } else {
                self.async_process_data(fw, entry, &ingress.face, data.clone(), true);
            }
            return;
        }

        // The outgoing Interest was discovery.
        match data.tags().prefix_ann().cloned() {
            Some(pa) => {
                if ingress.face.link_type() == LinkType::MultiAccess {
                    self.connect_unicast_and_add_route(fw, entry, ingress, data, pa);
                } else {
                    debug!(
                        "[Face {}] is not multi-access, announce route to it",
                        ingress.face.id()
                    );
                    Self::post_announce(&self.bridge, pa, ingress.face.id());
                    fw.send_data_to_all(entry, Some(ingress.face.id()), data);
                }
            }
            None => {
                // The upstream does not participate in self-learning.
                fw.send_data_to_all(entry, Some(ingress.face.id()), data);
            }
        }
    }

    fn after_receive_nack(
        &mut self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        nack: &Nack,
        entry: &Arc<PitEntry>,
    ) {
        debug!("{nack} from={ingress}");

        if nack.reason != NackReason::NoRoute {
            process_nack(fw, entry, ingress, nack);
            return;
        }

        // The upstream has no path for this name; retire its route.
        Self::post_renew(
            &self.bridge,
            nack.interest.name().clone(),
            ingress.face.id(),
            Duration::ZERO,
        );

        let Some(out_record) = entry.out_record(ingress.face.id()) else {
            debug!("Received no-route Nack for an unsent Interest");
            process_nack(fw, entry, ingress, nack);
            return;
        };

        let was_non_discovery = out_record
            .info
            .map_or(false, |info| info.is_non_discovery);
        if !was_non_discovery {
            // A compliant upstream does not no-route a discovery Interest.
            process_nack(fw, entry, ingress, nack);
            return;
        }

        let now = Instant::now();
        let interest = entry.interest();
        let Some(first_in_face) = entry.first_in_face() else {
            process_nack(fw, entry, ingress, nack);
            return;
        };

        let fib_entry = fw.lookup_fib(entry);
        let chosen = fib_entry
            .next_hops
            .iter()
            .find(|nexthop| {
                is_next_hop_eligible(&first_in_face, &interest, nexthop, entry, true, now)
            })
            .cloned();

        match chosen {
            Some(nexthop) => {
                // Recovery consumes the Nack.
                self.has_untried_nexthop_handler(
                    fw,
                    &first_in_face,
                    &nexthop.face,
                    &interest,
                    entry,
                );
            }
            None => {
                if Self::is_this_consumer(entry) {
                    // Restart discovery at the consumer.
                    entry.set_in_record_info(
                        first_in_face.id(),
                        InRecordInfo {
                            is_non_discovery: false,
                        },
                    );
                    let mut interest = interest;
                    interest.tags_mut().set_non_discovery(false);
                    self.broadcast_interest(fw, &interest, &first_in_face, entry);
                } else {
                    process_nack(fw, entry, ingress, nack);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MainTask;
    use crate::channel::{Channel, ChannelError, ConnectCallback};
    use rust_ndnsl_common::lp::NdnPacket;
    use rust_ndnsl_common::metrics::FwdMetrics;
    use rust_ndnsl_common::types::{EndpointId, FibUpdate};
    use rust_ndnsl_rib::service::{RibService, RibTask};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct Fixture {
        forwarder: Forwarder,
        strategy: SelfLearningStrategy,
        rib: RibService,
        rib_rx: mpsc::UnboundedReceiver<RibTask>,
        main_rx: mpsc::UnboundedReceiver<MainTask>,
        fib_rx: mpsc::UnboundedReceiver<FibUpdate>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_options(SelfLearningOptions::default())
        }

        fn with_options(options: SelfLearningOptions) -> Self {
            let (rib_tx, rib_rx) = mpsc::unbounded_channel();
            let (main_tx, main_rx) = mpsc::unbounded_channel();
            let (fib_tx, fib_rx) = mpsc::unbounded_channel();
            let metrics = Arc::new(FwdMetrics::new());
            let bridge = RibBridge::new(rib_tx, main_tx);
            let strategy =
                SelfLearningStrategy::new(SelfLearningStrategy::strategy_name(), bridge)
                    .unwrap()
                    .with_options(options);
            Self {
                forwarder: Forwarder::new(metrics.clone()),
                strategy,
                rib: RibService::new(fib_tx, metrics),
                rib_rx,
                main_rx,
                fib_rx,
            }
        }

        fn add_face(
            &mut self,
            scope: FaceScope,
            link_type: LinkType,
        ) -> (Arc<Face>, mpsc::UnboundedReceiver<NdnPacket>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                self.forwarder.add_face(Face::new(scope, link_type, tx)),
                rx,
            )
        }

        /// Runs the incoming-Interest pipeline steps the engine would run
        /// before the strategy trigger.
        fn pit_insert(&mut self, face: &Arc<Face>, interest: &Interest) -> Arc<PitEntry> {
            let now = Instant::now();
            let (entry, _) = self.forwarder.pit_mut().insert(interest, now);
            entry.insert_or_update_in_record(face, interest, now);
            entry
        }

        fn receive_interest(&mut self, face: &Arc<Face>, interest: &Interest) -> Arc<PitEntry> {
            let entry = self.pit_insert(face, interest);
            let ingress = FaceEndpoint::new(face.clone());
            self.strategy
                .after_receive_interest(&mut self.forwarder, &ingress, interest, &entry);
            entry
        }

        /// Applies queued RIB tasks, returning how many ran.
        fn drain_rib(&mut self) -> usize {
            let mut count = 0;
            while let Ok(task) = self.rib_rx.try_recv() {
                task(&mut self.rib);
                count += 1;
            }
            count
        }

        /// Applies continuations queued for the forwarding loop.
        fn drain_main(&mut self) -> usize {
            let mut count = 0;
            while let Ok(task) = self.main_rx.try_recv() {
                task(&mut self.forwarder);
                count += 1;
            }
            count
        }

        /// Applies pending FIB updates to the forwarder.
        fn drain_fib(&mut self) -> Vec<FibUpdate> {
            let mut updates = Vec::new();
            while let Ok(update) = self.fib_rx.try_recv() {
                self.forwarder.apply_fib_update(update.clone());
                updates.push(update);
            }
            updates
        }

        /// Seeds a learned route by announcing `pa` on `face` through the
        /// RIB, propagating it into the FIB.
        fn learn_route(&mut self, pa: &PrefixAnnouncement, face: FaceId) {
            self.rib
                .sl_announce(pa, face, SelfLearningStrategy::ROUTE_RENEW_LIFETIME, |_| {});
            self.drain_fib();
        }

        /// Stores `pa` in the RIB only, leaving the FIB untouched.
        fn seed_announcement(&mut self, pa: &PrefixAnnouncement, face: FaceId) {
            self.rib
                .sl_announce(pa, face, SelfLearningStrategy::ROUTE_RENEW_LIFETIME, |_| {});
            while self.fib_rx.try_recv().is_ok() {}
        }
    }

    fn interest(name: &str, nonce: u32) -> Interest {
        Interest::new(Name::from_string(name).unwrap()).with_nonce(nonce)
    }

    fn non_discovery_interest(name: &str, nonce: u32) -> Interest {
        let mut interest = interest(name, nonce);
        interest.tags_mut().set_non_discovery(true);
        interest
    }

    fn data(name: &str) -> Data {
        Data::new(Name::from_string(name).unwrap(), &b"payload"[..])
    }

    fn pa(prefix: &str) -> PrefixAnnouncement {
        PrefixAnnouncement::new(
            Name::from_string(prefix).unwrap(),
            Duration::from_secs(3600),
        )
    }

    fn recv_interest(rx: &mut mpsc::UnboundedReceiver<NdnPacket>) -> Interest {
        match rx.try_recv().expect("expected a packet") {
            NdnPacket::Interest(interest) => interest,
            other => panic!("expected Interest, got {other:?}"),
        }
    }

    fn recv_data(rx: &mut mpsc::UnboundedReceiver<NdnPacket>) -> Data {
        match rx.try_recv().expect("expected a packet") {
            NdnPacket::Data(data) => data,
            other => panic!("expected Data, got {other:?}"),
        }
    }

    fn recv_nack(rx: &mut mpsc::UnboundedReceiver<NdnPacket>) -> Nack {
        match rx.try_recv().expect("expected a packet") {
            NdnPacket::Nack(nack) => nack,
            other => panic!("expected Nack, got {other:?}"),
        }
    }

    /// A channel whose connect requests are resolved by hand in the test.
    #[derive(Default)]
    struct MockChannel {
        requests: Mutex<Vec<(EndpointId, ConnectCallback)>>,
    }

    impl MockChannel {
        fn take_request(&self) -> Option<(EndpointId, ConnectCallback)> {
            self.requests
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop()
        }
    }

    impl Channel for MockChannel {
        fn connect(
            &self,
            remote: EndpointId,
            _persistency: FacePersistency,
            done: ConnectCallback,
        ) {
            self.requests
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((remote, done));
        }
    }

    /* ------------------- scenarios from the design ------------------- */

    // First Interest, empty FIB, local consumer: discovery flood.
    #[tokio::test(start_paused = true)]
    async fn first_interest_without_route_broadcasts() {
        let mut fx = Fixture::new();
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (b, mut rx_b) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (c, mut rx_c) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            let sent = recv_interest(rx);
            assert_eq!(sent.name(), &Name::from_string("/a/b").unwrap());
            assert!(!sent.tags().has_non_discovery());
        }
        assert!(rx_l.try_recv().is_err());

        let in_info = entry.in_record(l.id()).unwrap().info.unwrap();
        assert!(!in_info.is_non_discovery);
        for face in [&a, &b, &c] {
            let out_info = entry.out_record(face.id()).unwrap().info.unwrap();
            assert!(!out_info.is_non_discovery);
        }

        // Faces are visited in reverse table order.
        let order: Vec<FaceId> = entry
            .out_records()
            .iter()
            .map(|record| record.face.id())
            .collect();
        assert_eq!(order, vec![c.id(), b.id(), a.id()]);
    }

    // First Interest with a usable FIB entry: lowest cost, tagged.
    #[tokio::test(start_paused = true)]
    async fn first_interest_uses_lowest_cost_nexthop() {
        let mut fx = Fixture::new();
        let (l, _rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (b, mut rx_b) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), b.clone(), 20);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));

        let sent = recv_interest(&mut rx_a);
        assert!(sent.tags().has_non_discovery());
        assert!(rx_b.try_recv().is_err());

        assert!(!entry.in_record(l.id()).unwrap().info.unwrap().is_non_discovery);
        assert!(entry.out_record(a.id()).unwrap().info.unwrap().is_non_discovery);
        assert!(entry.out_record(b.id()).is_none());
    }

    // Retransmission 5 ms later is suppressed.
    #[tokio::test(start_paused = true)]
    async fn early_retransmission_is_suppressed() {
        let mut fx = Fixture::new();
        let (l, _rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);

        fx.receive_interest(&l, &interest("/a/b", 1));
        let _ = recv_interest(&mut rx_a);

        tokio::time::advance(Duration::from_millis(5)).await;
        fx.receive_interest(&l, &interest("/a/b", 2));

        assert!(rx_a.try_recv().is_err());
        assert_eq!(fx.forwarder.metrics().interests_suppressed.value(), 1);
    }

    // Retransmission at 50 ms with every next-hop tried: earliest-used.
    #[tokio::test(start_paused = true)]
    async fn late_retransmission_retries_earliest_used() {
        let mut fx = Fixture::new();
        let (l, _rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);

        fx.receive_interest(&l, &interest("/a/b", 1));
        let _ = recv_interest(&mut rx_a);

        tokio::time::advance(Duration::from_millis(50)).await;
        fx.receive_interest(&l, &interest("/a/b", 2));

        // The all-tried fallback resends the Interest unchanged.
        let resent = recv_interest(&mut rx_a);
        assert!(!resent.tags().has_non_discovery());
    }

    // Data with an announcement over a multi-access face: unicast face
    // creation, route installation, delivery.
    #[tokio::test(start_paused = true)]
    async fn multiaccess_data_with_announcement_creates_unicast_face() {
        let mut fx = Fixture::new();
        let channel = Arc::new(MockChannel::default());
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (tx, _rx_m) = mpsc::unbounded_channel();
        let m = fx.forwarder.add_face(
            Face::new(FaceScope::NonLocal, LinkType::MultiAccess, tx)
                .with_channel(channel.clone()),
        );

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));
        assert!(entry.out_record(m.id()).is_some());

        let sender = EndpointId::Dev([0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01]);
        let mut incoming = data("/a/b");
        incoming.tags_mut().set_prefix_ann(pa("/a"));
        let ingress = FaceEndpoint::with_endpoint(m.clone(), sender.clone());
        let before = Instant::now();
        fx.strategy
            .after_receive_data(&mut fx.forwarder, &ingress, &incoming, &entry);

        // The entry was pinned for the asynchronous face creation.
        assert_eq!(entry.expiry(), before + Duration::from_secs(1));

        let (remote, done) = channel.take_request().unwrap();
        assert_eq!(remote, sender);

        // Resolve the connect request the way a transport channel would.
        let (tx, _rx_unicast) = mpsc::unbounded_channel();
        let unicast = fx.forwarder.add_face(
            Face::new(FaceScope::NonLocal, LinkType::PointToPoint, tx)
                .with_persistency(FacePersistency::OnDemand)
                .with_remote(sender),
        );
        done(&mut fx.forwarder, Ok(unicast.clone()));

        assert_eq!(fx.forwarder.face_table().len(), 3);

        // The route lands on the new unicast face.
        assert_eq!(fx.drain_rib(), 1);
        let updates = fx.drain_fib();
        assert_eq!(
            updates,
            vec![FibUpdate::Add {
                name: Name::from_string("/a").unwrap(),
                face: unicast.id(),
                cost: 0
            }]
        );

        // The consumer got its Data and the entry was released.
        let delivered = recv_data(&mut rx_l);
        assert_eq!(delivered.name(), &Name::from_string("/a/b").unwrap());
        assert!(entry.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn unicast_face_creation_failure_still_delivers() {
        let mut fx = Fixture::new();
        let channel = Arc::new(MockChannel::default());
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (tx, _rx_m) = mpsc::unbounded_channel();
        let m = fx.forwarder.add_face(
            Face::new(FaceScope::NonLocal, LinkType::MultiAccess, tx)
                .with_channel(channel.clone()),
        );

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));
        let mut incoming = data("/a/b");
        incoming.tags_mut().set_prefix_ann(pa("/a"));
        let sender = EndpointId::Dev([0xaa, 0, 0, 0, 0, 2]);
        let ingress = FaceEndpoint::with_endpoint(m.clone(), sender);
        fx.strategy
            .after_receive_data(&mut fx.forwarder, &ingress, &incoming, &entry);

        let (_remote, done) = channel.take_request().unwrap();
        done(
            &mut fx.forwarder,
            Err(ChannelError::ConnectFailed("refused".into())),
        );

        // No route was installed, but the Data still reached the consumer.
        assert_eq!(fx.drain_rib(), 0);
        let _ = recv_data(&mut rx_l);
        assert_eq!(fx.forwarder.face_table().len(), 2);
    }

    // NoRoute Nack at the consumer with no alternative: rediscovery.
    #[tokio::test(start_paused = true)]
    async fn noroute_nack_at_consumer_restarts_discovery() {
        let mut fx = Fixture::new();
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.learn_route(&pa("/a"), a.id());

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));
        let sent = recv_interest(&mut rx_a);
        assert!(sent.tags().has_non_discovery());

        let nack = Nack::new(NackReason::NoRoute, sent);
        fx.strategy.after_receive_nack(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &nack,
            &entry,
        );

        // Exactly one RIB call: the retiring renewal.
        assert_eq!(fx.drain_rib(), 1);
        let updates = fx.drain_fib();
        assert_eq!(
            updates,
            vec![FibUpdate::Remove {
                name: Name::from_string("/a").unwrap(),
                face: a.id()
            }]
        );

        // The in-record reverted to discovery and the Interest was
        // rebroadcast without its tag.
        assert!(!entry.in_record(l.id()).unwrap().info.unwrap().is_non_discovery);
        let rebroadcast = recv_interest(&mut rx_a);
        assert!(!rebroadcast.tags().has_non_discovery());
        assert!(!entry.out_record(a.id()).unwrap().info.unwrap().is_non_discovery);

        // Recovery consumed the Nack.
        assert!(rx_l.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn noroute_nack_with_untried_nexthop_fails_over() {
        let mut fx = Fixture::new();
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (b, mut rx_b) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), b.clone(), 20);

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));
        let sent = recv_interest(&mut rx_a);

        let nack = Nack::new(NackReason::NoRoute, sent);
        fx.strategy.after_receive_nack(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &nack,
            &entry,
        );
        assert_eq!(fx.drain_rib(), 1);

        // Failover to the untried next-hop, still non-discovery.
        let failover = recv_interest(&mut rx_b);
        assert!(failover.tags().has_non_discovery());
        assert!(entry.out_record(b.id()).unwrap().info.unwrap().is_non_discovery);

        // The Nack was consumed by the recovery.
        assert!(rx_l.try_recv().is_err());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn noroute_nack_without_recovery_propagates() {
        let mut fx = Fixture::new();
        // The downstream is non-local, so this forwarder is not the consumer.
        let (d, mut rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);

        let entry = fx.receive_interest(&d, &non_discovery_interest("/a/b", 1));
        let sent = recv_interest(&mut rx_a);

        let nack = Nack::new(NackReason::NoRoute, sent);
        fx.strategy.after_receive_nack(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &nack,
            &entry,
        );
        assert_eq!(fx.drain_rib(), 1);

        // No untried next-hop, not the consumer: the Nack reaches the
        // downstream exactly once.
        let relayed = recv_nack(&mut rx_d);
        assert_eq!(relayed.reason, NackReason::NoRoute);
        assert!(rx_d.try_recv().is_err());
        assert!(rx_a.try_recv().is_err());
    }

    /* --------------------- Interest edge cases ---------------------- */

    #[tokio::test(start_paused = true)]
    async fn non_discovery_interest_without_route_is_nacked() {
        let mut fx = Fixture::new();
        let (d, mut rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (_a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        let entry = fx.receive_interest(&d, &non_discovery_interest("/a/b", 1));

        let nack = recv_nack(&mut rx_d);
        assert_eq!(nack.reason, NackReason::NoRoute);
        // Rejected, not broadcast.
        assert!(rx_a.try_recv().is_err());
        assert!(entry.is_expired(Instant::now()));
        // The in-record was recorded as non-discovery before rejection.
        assert_eq!(fx.forwarder.metrics().nacks_sent.value(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_includes_ad_hoc_ingress() {
        let mut fx = Fixture::new();
        let (h, mut rx_h) = fx.add_face(FaceScope::NonLocal, LinkType::AdHoc);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        let entry = fx.receive_interest(&h, &interest("/a/b", 1));

        // The ad-hoc ingress is flooded too.
        let _ = recv_interest(&mut rx_h);
        let _ = recv_interest(&mut rx_a);
        assert!(entry.out_record(h.id()).is_some());
        assert!(entry.out_record(a.id()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_respects_scope() {
        let mut fx = Fixture::new();
        let (l, _rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (_a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        // A /localhost name cannot reach non-local faces.
        fx.receive_interest(&l, &interest("/localhost/a", 1));
        assert!(rx_a.try_recv().is_err());
    }

    /* ------------------------- Data paths --------------------------- */

    #[tokio::test(start_paused = true)]
    async fn data_without_out_record_is_dropped() {
        let mut fx = Fixture::new();
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, _rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        let entry = fx.pit_insert(&l, &interest("/a/b", 1));
        fx.strategy.after_receive_data(
            &mut fx.forwarder,
            &FaceEndpoint::new(a),
            &data("/a/b"),
            &entry,
        );
        assert!(rx_l.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn data_for_local_consumer_needs_no_announcement() {
        let mut fx = Fixture::new();
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, _rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));
        fx.strategy.after_receive_data(
            &mut fx.forwarder,
            &FaceEndpoint::new(a),
            &data("/a/b"),
            &entry,
        );

        // Delivered synchronously, no RIB involvement.
        let delivered = recv_data(&mut rx_l);
        assert!(delivered.tags().prefix_ann().is_none());
        assert_eq!(fx.drain_rib(), 0);
        assert_eq!(fx.drain_main(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn data_for_remote_discovery_downstream_gets_announcement() {
        let mut fx = Fixture::new();
        let (d, mut rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (producer, _rx_p) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);
        // The RIB knows the announcement for /a (e.g. a local producer
        // registered it).
        fx.seed_announcement(&pa("/a"), producer.id());

        // A discovery Interest from a remote downstream was forwarded
        // non-discovery upstream.
        let entry = fx.receive_interest(&d, &interest("/a/b", 1));
        let _ = recv_interest(&mut rx_a);

        let before = Instant::now();
        fx.strategy.after_receive_data(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &data("/a/b"),
            &entry,
        );

        // Pinned while the PA lookup crosses threads.
        assert_eq!(entry.expiry(), before + Duration::from_secs(1));
        assert_eq!(fx.drain_rib(), 1);
        assert_eq!(fx.drain_main(), 1);

        let delivered = recv_data(&mut rx_d);
        assert_eq!(
            delivered.tags().prefix_ann().unwrap().prefix(),
            &Name::from_string("/a").unwrap()
        );
        assert!(entry.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_announcement_lets_the_entry_expire() {
        let mut fx = Fixture::new();
        let (d, mut rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);

        let entry = fx.receive_interest(&d, &interest("/a/b", 1));
        let _ = recv_interest(&mut rx_a);

        fx.strategy.after_receive_data(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &data("/a/b"),
            &entry,
        );

        // The RIB has no announcement: no continuation, no delivery.
        assert_eq!(fx.drain_rib(), 1);
        assert_eq!(fx.drain_main(), 0);
        assert!(rx_d.try_recv().is_err());
        assert!(!entry.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_continuation_is_abandoned() {
        let mut fx = Fixture::new();
        let (d, mut rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (producer, _rx_p) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);
        fx.seed_announcement(&pa("/a"), producer.id());

        let entry = fx.receive_interest(&d, &interest("/a/b", 1));
        let _ = recv_interest(&mut rx_a);
        fx.strategy.after_receive_data(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &data("/a/b"),
            &entry,
        );
        fx.drain_rib();

        // The ingress face disappears before the continuation runs.
        fx.forwarder.remove_face(a.id());
        assert_eq!(fx.drain_main(), 1);
        assert!(rx_d.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_abandons_continuation() {
        let mut fx = Fixture::new();
        let (d, mut rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (producer, _rx_p) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);
        fx.seed_announcement(&pa("/a"), producer.id());

        let entry = fx.receive_interest(&d, &interest("/a/b", 1));
        let _ = recv_interest(&mut rx_a);
        fx.strategy.after_receive_data(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &data("/a/b"),
            &entry,
        );
        fx.drain_rib();

        // The entry expires and is swept before the continuation runs;
        // only the weak reference remains.
        drop(entry);
        tokio::time::advance(Duration::from_secs(2)).await;
        fx.forwarder.pit_mut().sweep(Instant::now());

        assert_eq!(fx.drain_main(), 1);
        assert!(rx_d.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_data_with_announcement_on_p2p_installs_route() {
        let mut fx = Fixture::new();
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        // Discovery flood reaches A.
        let entry = fx.receive_interest(&l, &interest("/a/b", 1));
        let _ = recv_interest(&mut rx_a);

        let mut incoming = data("/a/b");
        incoming.tags_mut().set_prefix_ann(pa("/a"));
        fx.strategy.after_receive_data(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &incoming,
            &entry,
        );

        // The route goes to the Data's ingress face.
        assert_eq!(fx.drain_rib(), 1);
        let updates = fx.drain_fib();
        assert_eq!(
            updates,
            vec![FibUpdate::Add {
                name: Name::from_string("/a").unwrap(),
                face: a.id(),
                cost: 0
            }]
        );
        let _ = recv_data(&mut rx_l);
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_data_without_announcement_installs_nothing() {
        let mut fx = Fixture::new();
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));
        let _ = recv_interest(&mut rx_a);

        fx.strategy.after_receive_data(
            &mut fx.forwarder,
            &FaceEndpoint::new(a.clone()),
            &data("/a/b"),
            &entry,
        );

        assert_eq!(fx.drain_rib(), 0);
        let _ = recv_data(&mut rx_l);
    }

    /* --------------------- content store paths ---------------------- */

    #[tokio::test(start_paused = true)]
    async fn cs_hit_for_local_consumer_delivers_directly() {
        let mut fx = Fixture::new();
        let (l, mut rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);

        let entry = fx.pit_insert(&l, &interest("/a/b", 1));
        fx.strategy.after_content_store_hit(
            &mut fx.forwarder,
            &FaceEndpoint::new(l.clone()),
            &data("/a/b"),
            &entry,
        );

        let _ = recv_data(&mut rx_l);
        assert_eq!(fx.drain_rib(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cs_hit_for_remote_discovery_attaches_announcement() {
        let mut fx = Fixture::new();
        let (d, mut rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        let (producer, _rx_p) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.seed_announcement(&pa("/a"), producer.id());

        let entry = fx.pit_insert(&d, &interest("/a/b", 1));
        fx.strategy.after_content_store_hit(
            &mut fx.forwarder,
            &FaceEndpoint::new(d.clone()),
            &data("/a/b"),
            &entry,
        );

        assert_eq!(fx.drain_rib(), 1);
        assert_eq!(fx.drain_main(), 1);
        let delivered = recv_data(&mut rx_d);
        assert!(delivered.tags().prefix_ann().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cs_hit_for_remote_non_discovery_delivers_plain() {
        let mut fx = Fixture::new();
        let (d, mut rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        let entry = fx.pit_insert(&d, &non_discovery_interest("/a/b", 1));
        fx.strategy.after_content_store_hit(
            &mut fx.forwarder,
            &FaceEndpoint::new(d.clone()),
            &data("/a/b"),
            &entry,
        );

        let delivered = recv_data(&mut rx_d);
        assert!(delivered.tags().prefix_ann().is_none());
        assert_eq!(fx.drain_rib(), 0);
    }

    /* -------------------------- misc ------------------------------- */

    #[tokio::test(start_paused = true)]
    async fn need_prefix_ann_is_idempotent() {
        let mut fx = Fixture::new();
        let (l, _rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (d, _rx_d) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);

        let entry = fx.pit_insert(&l, &interest("/a/b", 1));
        entry.set_in_record_info(l.id(), InRecordInfo { is_non_discovery: false });
        let now = Instant::now();
        assert!(!SelfLearningStrategy::need_prefix_ann(&entry, now));
        assert!(!SelfLearningStrategy::need_prefix_ann(&entry, now));

        entry.insert_or_update_in_record(&d, &interest("/a/b", 2), now);
        entry.set_in_record_info(d.id(), InRecordInfo { is_non_discovery: false });
        assert!(SelfLearningStrategy::need_prefix_ann(&entry, now));
        assert!(SelfLearningStrategy::need_prefix_ann(&entry, now));
    }

    #[tokio::test(start_paused = true)]
    async fn retx_broadcast_option_restarts_discovery() {
        let mut fx = Fixture::with_options(SelfLearningOptions {
            retx_triggers_broadcast: true,
        });

        let (l, _rx_l) = fx.add_face(FaceScope::Local, LinkType::PointToPoint);
        let (a, mut rx_a) = fx.add_face(FaceScope::NonLocal, LinkType::PointToPoint);
        fx.forwarder
            .fib_mut()
            .insert(Name::from_string("/a").unwrap(), a.clone(), 10);

        let entry = fx.receive_interest(&l, &interest("/a/b", 1));
        let first = recv_interest(&mut rx_a);
        assert!(first.tags().has_non_discovery());

        // Drive the per-entry retransmission counter to the threshold.
        use crate::strategy::retx_suppression::RetxInfo;
        entry.set_retx_info(RetxInfo {
            suppression_interval: Duration::from_millis(10),
            retx_count: SelfLearningStrategy::RETX_TRIGGER_BROADCAST_COUNT,
        });
        tokio::time::advance(Duration::from_millis(300)).await;
        fx.receive_interest(&l, &interest("/a/b", 2));

        // The tried route is retired and discovery restarts untagged.
        assert_eq!(fx.drain_rib(), 1);
        let reflood = recv_interest(&mut rx_a);
        assert!(!reflood.tags().has_non_discovery());
        assert_eq!(entry.retx_info().unwrap().retx_count, 0);
    }
}
