//! The strategy layer.
//!
//! A strategy decides where Interests go and how Data and Nacks are
//! treated. Strategies are addressed by versioned instance names; the
//! registry maps a requested name to a constructor.

pub mod algorithm;
pub mod retx_suppression;
pub mod self_learning;

use crate::bridge::RibBridge;
use crate::face::FaceEndpoint;
use crate::forwarder::Forwarder;
use crate::pit::PitEntry;
use log::debug;
use rust_ndnsl_common::lp::Nack;
use rust_ndnsl_common::ndn::{Data, Interest, Name};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

pub use self_learning::{SelfLearningOptions, SelfLearningStrategy};

/// Forwarding strategy triggers, invoked by the engine pipelines.
pub trait Strategy: Send {
    /// The versioned name this instance answers to.
    fn instance_name(&self) -> &Name;

    /// An Interest arrived and was inserted into the PIT.
    fn after_receive_interest(
        &mut self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        interest: &Interest,
        entry: &Arc<PitEntry>,
    );

    /// The content store satisfied the Interest.
    fn after_content_store_hit(
        &mut self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        data: &Data,
        entry: &Arc<PitEntry>,
    );

    /// Data matched the PIT entry.
    fn after_receive_data(
        &mut self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        data: &Data,
        entry: &Arc<PitEntry>,
    );

    /// A link-layer Nack referenced the PIT entry.
    fn after_receive_nack(
        &mut self,
        fw: &mut Forwarder,
        ingress: &FaceEndpoint,
        nack: &Nack,
        entry: &Arc<PitEntry>,
    );
}

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("unknown strategy {0}")]
    Unknown(Name),

    #[error("strategy {0} does not accept parameters")]
    UnexpectedParameters(&'static str),

    #[error("strategy {0} does not support version {1}")]
    UnsupportedVersion(&'static str, u64),

    #[error("malformed strategy instance name {0}")]
    Malformed(Name),
}

/// A strategy instance name split into its base prefix, optional version
/// and trailing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInstanceName {
    pub prefix: Name,
    pub version: Option<u64>,
    pub parameters: Name,
}

/// Splits `name` against the known strategy `base` prefix.
pub fn parse_instance_name(name: &Name, base: &Name) -> Result<ParsedInstanceName, StrategyError> {
    if !base.is_prefix_of(name) {
        return Err(StrategyError::Malformed(name.clone()));
    }

    let mut version = None;
    let mut rest = base.len();
    if let Some(component) = name.get(rest) {
        if component.is_version() {
            version = Some(
                component
                    .to_version()
                    .map_err(|_| StrategyError::Malformed(name.clone()))?,
            );
            rest += 1;
        }
    }

    let mut parameters = Name::new();
    for component in name.components().skip(rest) {
        parameters.push(component.clone());
    }

    Ok(ParsedInstanceName {
        prefix: base.clone(),
        version,
        parameters,
    })
}

/// Instantiates the strategy registered under `name`.
pub fn create(name: &Name, bridge: RibBridge) -> Result<Box<dyn Strategy>, StrategyError> {
    let self_learning_base = SelfLearningStrategy::strategy_name().prefix(4);
    if self_learning_base.is_prefix_of(name) {
        return Ok(Box::new(SelfLearningStrategy::new(name.clone(), bridge)?));
    }
    Err(StrategyError::Unknown(name.clone()))
}

/// Names of all registered strategies.
pub fn list_registered() -> Vec<Name> {
    vec![SelfLearningStrategy::strategy_name()]
}

/// Default Nack processing: best-effort reverse propagation.
///
/// The reason is recorded on the out-record. While some upstream is still
/// pending nothing is propagated; once every upstream has answered or
/// expired, the least severe recorded reason is relayed to every remaining
/// downstream.
pub fn process_nack(fw: &mut Forwarder, entry: &Arc<PitEntry>, ingress: &FaceEndpoint, nack: &Nack) {
    entry.set_out_record_nacked(ingress.face.id(), nack.reason);

    let now = Instant::now();
    if entry.has_pending_out_records(now) {
        debug!("{nack} from={ingress} waiting for other upstreams");
        return;
    }

    let mut reason = nack.reason;
    for out_record in entry.out_records() {
        if let Some(other) = out_record.nacked {
            if other.is_less_severe(reason) {
                reason = other;
            }
        }
    }

    let downstreams: Vec<_> = entry
        .in_records()
        .into_iter()
        .filter(|record| record.expiry > now)
        .map(|record| record.face)
        .collect();
    debug!("{nack} from={ingress} relaying {reason} to {} downstreams", downstreams.len());
    for face in downstreams {
        fw.send_nack(entry, &face, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::Face;
    use rust_ndnsl_common::lp::{NackReason, NdnPacket};
    use rust_ndnsl_common::metrics::FwdMetrics;
    use rust_ndnsl_common::types::{FaceScope, LinkType};
    use tokio::sync::mpsc;

    fn bridge() -> RibBridge {
        let (rib_tx, _rib_rx) = mpsc::unbounded_channel();
        let (main_tx, _main_rx) = mpsc::unbounded_channel();
        RibBridge::new(rib_tx, main_tx)
    }

    #[test]
    fn parse_versioned_instance_names() {
        let base = Name::from_string("/localhost/nfd/strategy/self-learning").unwrap();

        let plain = parse_instance_name(&base, &base).unwrap();
        assert_eq!(plain.version, None);
        assert!(plain.parameters.is_empty());

        let versioned = parse_instance_name(&base.append_version(2), &base).unwrap();
        assert_eq!(versioned.version, Some(2));
        assert!(versioned.parameters.is_empty());

        let mut with_params = base.append_version(2);
        with_params.push(rust_ndnsl_common::ndn::NameComponent::new(
            b"param".to_vec(),
        ));
        let parsed = parse_instance_name(&with_params, &base).unwrap();
        assert_eq!(parsed.version, Some(2));
        assert_eq!(parsed.parameters.len(), 1);

        let other = Name::from_string("/localhost/nfd/strategy/other").unwrap();
        assert!(parse_instance_name(&other, &base).is_err());
    }

    #[test]
    fn registry_instantiation() {
        // Every registered strategy accepts its own canonical name.
        for name in list_registered() {
            let strategy = create(&name, bridge()).unwrap();
            assert_eq!(strategy.instance_name(), &name);
        }

        // Parameters are rejected.
        let mut with_params = SelfLearningStrategy::strategy_name();
        with_params.push(rust_ndnsl_common::ndn::NameComponent::new(
            b"param".to_vec(),
        ));
        assert!(matches!(
            create(&with_params, bridge()),
            Err(StrategyError::UnexpectedParameters(_))
        ));

        // Mismatched versions are rejected.
        let wrong_version = SelfLearningStrategy::strategy_name().prefix(4).append_version(1);
        assert!(matches!(
            create(&wrong_version, bridge()),
            Err(StrategyError::UnsupportedVersion(_, 1))
        ));

        // Unversioned names resolve to the registered version.
        let unversioned = SelfLearningStrategy::strategy_name().prefix(4);
        let strategy = create(&unversioned, bridge()).unwrap();
        assert_eq!(
            strategy.instance_name(),
            &SelfLearningStrategy::strategy_name()
        );

        let unknown = Name::from_string("/localhost/nfd/strategy/no-such").unwrap();
        assert!(matches!(
            create(&unknown, bridge()),
            Err(StrategyError::Unknown(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn process_nack_waits_then_relays_least_severe() {
        let metrics = std::sync::Arc::new(FwdMetrics::new());
        let mut fw = Forwarder::new(metrics);

        let (tx, mut down_rx) = mpsc::unbounded_channel();
        let downstream = fw.add_face(Face::new(FaceScope::Local, LinkType::PointToPoint, tx));
        let (tx, _rx) = mpsc::unbounded_channel();
        let up_a = fw.add_face(Face::new(FaceScope::NonLocal, LinkType::PointToPoint, tx));
        let (tx, _rx) = mpsc::unbounded_channel();
        let up_b = fw.add_face(Face::new(FaceScope::NonLocal, LinkType::PointToPoint, tx));

        let interest = Interest::new(Name::from_string("/a").unwrap()).with_nonce(1);
        let now = Instant::now();
        let (entry, _) = fw.pit_mut().insert(&interest, now);
        entry.insert_or_update_in_record(&downstream, &interest, now);
        entry.insert_or_update_out_record(&up_a, &interest, now);
        entry.insert_or_update_out_record(&up_b, &interest, now);

        // First Nack: the other upstream is still pending, nothing relayed.
        let nack = Nack::new(NackReason::Congestion, interest.clone());
        process_nack(&mut fw, &entry, &FaceEndpoint::new(up_a), &nack);
        assert!(down_rx.try_recv().is_err());

        // Second Nack: both upstreams answered, the least severe reason
        // reaches the downstream.
        let nack = Nack::new(NackReason::NoRoute, interest);
        process_nack(&mut fw, &entry, &FaceEndpoint::new(up_b), &nack);
        match down_rx.try_recv().unwrap() {
            NdnPacket::Nack(relayed) => assert_eq!(relayed.reason, NackReason::Congestion),
            other => panic!("unexpected packet {other:?}"),
        }
    }
}
