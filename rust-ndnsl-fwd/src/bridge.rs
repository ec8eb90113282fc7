//! Bridge between the forwarding loop and the RIB loop.
//!
//! The original design posts closures between two io_services; here each
//! loop consumes boxed tasks from an unbounded channel. The bridge is the
//! only handle the strategy needs to reach the RIB thread and to get
//! continuations back onto the forwarding thread.

use crate::forwarder::Forwarder;
use log::warn;
use rust_ndnsl_rib::service::{RibService, RibTask};
use tokio::sync::mpsc;

/// A unit of work posted back to the forwarding thread.
pub type MainTask = Box<dyn FnOnce(&mut Forwarder) + Send>;

#[derive(Clone)]
pub struct RibBridge {
    rib_tx: mpsc::UnboundedSender<RibTask>,
    main_tx: mpsc::UnboundedSender<MainTask>,
}

impl RibBridge {
    pub fn new(
        rib_tx: mpsc::UnboundedSender<RibTask>,
        main_tx: mpsc::UnboundedSender<MainTask>,
    ) -> Self {
        Self { rib_tx, main_tx }
    }

    /// Posts a task to the RIB thread.
    pub fn run_on_rib(&self, task: impl FnOnce(&mut RibService) + Send + 'static) {
        if self.rib_tx.send(Box::new(task)).is_err() {
            warn!("RIB loop gone, dropping task");
        }
    }

    /// Posts a task to the forwarding thread.
    pub fn run_on_main(&self, task: impl FnOnce(&mut Forwarder) + Send + 'static) {
        if self.main_tx.send(Box::new(task)).is_err() {
            warn!("forwarding loop gone, dropping task");
        }
    }

    /// The raw sender for the forwarding thread, handed to transports and
    /// channels that need to schedule work there.
    pub fn main_sender(&self) -> mpsc::UnboundedSender<MainTask> {
        self.main_tx.clone()
    }
}
