//! The forwarding-thread event loop and packet pipelines.
//!
//! One engine task owns the forwarder and the strategy. It consumes
//! transport events, continuations posted back from the RIB thread, FIB
//! updates, and a periodic PIT sweep.

use crate::bridge::MainTask;
use crate::face::FaceEndpoint;
use crate::forwarder::Forwarder;
use crate::strategy::Strategy;
use log::{debug, info, trace};
use rust_ndnsl_common::lp::{Nack, NdnPacket};
use rust_ndnsl_common::ndn::{Data, Interest, Name};
use rust_ndnsl_common::types::{EndpointId, FaceId, FaceScope, FibUpdate};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Transport-side input to the forwarding loop.
#[derive(Debug)]
pub enum FwEvent {
    Packet {
        face: FaceId,
        endpoint: Option<EndpointId>,
        packet: NdnPacket,
    },
}

const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

pub struct Engine {
    forwarder: Forwarder,
    strategy: Box<dyn Strategy>,
    events_rx: mpsc::UnboundedReceiver<FwEvent>,
    tasks_rx: mpsc::UnboundedReceiver<MainTask>,
    fib_rx: mpsc::UnboundedReceiver<FibUpdate>,
}

impl Engine {
    pub fn new(
        forwarder: Forwarder,
        strategy: Box<dyn Strategy>,
        events_rx: mpsc::UnboundedReceiver<FwEvent>,
        tasks_rx: mpsc::UnboundedReceiver<MainTask>,
        fib_rx: mpsc::UnboundedReceiver<FibUpdate>,
    ) -> Self {
        Self {
            forwarder,
            strategy,
            events_rx,
            tasks_rx,
            fib_rx,
        }
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    pub fn forwarder_mut(&mut self) -> &mut Forwarder {
        &mut self.forwarder
    }

    pub async fn run(mut self) {
        info!(
            "forwarding engine started, strategy={}",
            self.strategy.instance_name()
        );
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                task = self.tasks_rx.recv() => {
                    if let Some(task) = task {
                        task(&mut self.forwarder);
                    }
                }
                update = self.fib_rx.recv() => {
                    if let Some(update) = update {
                        self.forwarder.apply_fib_update(update);
                    }
                }
                _ = sweep.tick() => self.sweep(),
            }
        }
        info!("forwarding engine stopped");
    }

    /// Dispatches one transport event through the pipelines.
    pub fn handle_event(&mut self, event: FwEvent) {
        let FwEvent::Packet {
            face,
            endpoint,
            packet,
        } = event;
        let Some(face) = self.forwarder.get_face(face) else {
            debug!("packet from unknown face={face}, dropped");
            return;
        };
        let ingress = match endpoint {
            Some(endpoint) => FaceEndpoint::with_endpoint(face, endpoint),
            None => FaceEndpoint::new(face),
        };
        match packet {
            NdnPacket::Interest(interest) => self.on_incoming_interest(ingress, interest),
            NdnPacket::Data(data) => self.on_incoming_data(ingress, data),
            NdnPacket::Nack(nack) => self.on_incoming_nack(ingress, nack),
        }
    }

    fn on_incoming_interest(&mut self, ingress: FaceEndpoint, interest: Interest) {
        trace!("{interest} from={ingress}");
        let metrics = self.forwarder.metrics().clone();
        metrics.interests_received.increment();

        if is_localhost(interest.name()) && ingress.face.scope() != FaceScope::Local {
            debug!("{interest} from={ingress} violates /localhost scope, dropped");
            return;
        }

        let now = Instant::now();
        let (entry, is_new) = self.forwarder.pit_mut().insert(&interest, now);
        if is_new {
            metrics.pit_inserts.increment();
        }
        entry.insert_or_update_in_record(&ingress.face, &interest, now);

        match self.forwarder.cs().find(&interest, now) {
            Some(data) => {
                metrics.cs_hits.increment();
                self.strategy
                    .after_content_store_hit(&mut self.forwarder, &ingress, &data, &entry);
            }
            None => {
                metrics.cs_misses.increment();
                self.strategy
                    .after_receive_interest(&mut self.forwarder, &ingress, &interest, &entry);
            }
        }
        metrics.pit_size.set(self.forwarder.pit().len() as u64);
    }

    fn on_incoming_data(&mut self, ingress: FaceEndpoint, data: Data) {
        trace!("{data} from={ingress}");
        let metrics = self.forwarder.metrics().clone();
        metrics.data_received.increment();

        let matches = self.forwarder.pit().find_matches(data.name());
        if matches.is_empty() {
            debug!("{data} from={ingress} unsolicited, dropped");
            metrics.data_unsolicited.increment();
            return;
        }

        for entry in &matches {
            self.strategy
                .after_receive_data(&mut self.forwarder, &ingress, &data, entry);
        }
        self.forwarder.cs_mut().insert(data, Instant::now());
    }

    fn on_incoming_nack(&mut self, ingress: FaceEndpoint, nack: Nack) {
        trace!("{nack} from={ingress}");
        self.forwarder.metrics().nacks_received.increment();

        let Some(entry) = self
            .forwarder
            .pit()
            .find(nack.interest.name(), nack.interest.can_be_prefix)
        else {
            debug!("{nack} from={ingress} matches no PIT entry, dropped");
            return;
        };
        self.strategy
            .after_receive_nack(&mut self.forwarder, &ingress, &nack, &entry);
    }

    fn sweep(&mut self) {
        let metrics = self.forwarder.metrics().clone();
        let expired = self.forwarder.pit_mut().sweep(Instant::now());
        if expired > 0 {
            trace!("swept {expired} expired PIT entries");
            metrics.pit_expirations.add(expired as u64);
        }
        metrics.pit_size.set(self.forwarder.pit().len() as u64);
    }
}

fn is_localhost(name: &Name) -> bool {
    name.get(0).map(|c| c.as_bytes().as_ref()) == Some(b"localhost".as_ref())
}
