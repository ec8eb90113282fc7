//! The RIB service and its event loop.

use crate::route::{RibEntry, Route, RouteOrigin};
use log::{debug, info, trace, warn};
use rust_ndnsl_common::announcement::PrefixAnnouncement;
use rust_ndnsl_common::metrics::FwdMetrics;
use rust_ndnsl_common::ndn::Name;
use rust_ndnsl_common::types::{FaceId, FibUpdate};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A unit of work posted to the RIB thread by the forwarding side.
pub type RibTask = Box<dyn FnOnce(&mut RibService) + Send>;

/// Outcome of a self-learning RIB operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlAnnounceResult {
    Ok,
    Error,
    ValidationFailure,
    Expired,
    NotFound,
}

impl fmt::Display for SlAnnounceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SlAnnounceResult::Ok => "OK",
            SlAnnounceResult::Error => "ERROR",
            SlAnnounceResult::ValidationFailure => "VALIDATION_FAILURE",
            SlAnnounceResult::Expired => "EXPIRED",
            SlAnnounceResult::NotFound => "NOT_FOUND",
        };
        write!(f, "{text}")
    }
}

/// Interval between route expiry sweeps.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// The route database, owned by the RIB thread.
pub struct RibService {
    entries: HashMap<Name, RibEntry>,
    fib_tx: mpsc::UnboundedSender<FibUpdate>,
    metrics: Arc<FwdMetrics>,
}

impl RibService {
    pub fn new(fib_tx: mpsc::UnboundedSender<FibUpdate>, metrics: Arc<FwdMetrics>) -> Self {
        Self {
            entries: HashMap::new(),
            fib_tx,
            metrics,
        }
    }

    /// Consumes tasks posted by the forwarding side and periodically sweeps
    /// expired routes.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RibTask>) {
        info!("RIB service started");
        let mut sweep = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                task = rx.recv() => {
                    match task {
                        Some(task) => task(&mut self),
                        None => break,
                    }
                }
                _ = sweep.tick() => {
                    self.expire_routes(Instant::now());
                }
            }
        }
        info!("RIB service stopped");
    }

    /// Registers a static (operator-configured) route.
    pub fn register(&mut self, name: Name, face: FaceId, cost: u32) {
        let entry = self
            .entries
            .entry(name.clone())
            .or_insert_with(|| RibEntry::new(name.clone()));
        if let Some(route) = entry.route_on_mut(face) {
            route.cost = cost;
        } else {
            entry.routes.push(Route {
                face,
                origin: RouteOrigin::Static,
                cost,
                expiry: None,
                announcement: None,
            });
        }
        debug!("Registered static route {name} via face={face} cost={cost}");
        self.push_fib_update(FibUpdate::Add { name, face, cost });
    }

    /// Installs or renews a route learned from a Prefix Announcement.
    ///
    /// The route lasts for the shorter of `lifetime` and the announcement's
    /// own validity, and is idempotent for the same (prefix, face) pair.
    pub fn sl_announce(
        &mut self,
        pa: &PrefixAnnouncement,
        face: FaceId,
        lifetime: Duration,
        callback: impl FnOnce(SlAnnounceResult),
    ) {
        if !self.validate(pa) {
            callback(SlAnnounceResult::ValidationFailure);
            return;
        }

        let granted = lifetime.min(pa.expiration());
        if granted.is_zero() {
            debug!("Announcement for {} already expired", pa.prefix());
            callback(SlAnnounceResult::Expired);
            return;
        }

        let name = pa.prefix().clone();
        let expiry = Instant::now() + granted;
        let entry = self
            .entries
            .entry(name.clone())
            .or_insert_with(|| RibEntry::new(name.clone()));

        if let Some(route) = entry.route_on_mut(face) {
            route.expiry = Some(expiry);
            route.announcement = Some(pa.clone());
            trace!("Renewed announced route {name} via face={face}");
            self.metrics.routes_renewed.increment();
        } else {
            entry.routes.push(Route {
                face,
                origin: RouteOrigin::PrefixAnn,
                cost: 0,
                expiry: Some(expiry),
                announcement: Some(pa.clone()),
            });
            debug!(
                "Installed announced route {name} via face={face} for {}ms",
                granted.as_millis()
            );
            self.metrics.routes_announced.increment();
        }

        self.push_fib_update(FibUpdate::Add {
            name,
            face,
            cost: 0,
        });
        callback(SlAnnounceResult::Ok);
    }

    /// Renews or retires the announced route covering `name` on `face`.
    ///
    /// `max_lifetime == 0` retires the route immediately.
    pub fn sl_renew(
        &mut self,
        name: &Name,
        face: FaceId,
        max_lifetime: Duration,
        callback: impl FnOnce(SlAnnounceResult),
    ) {
        let Some(prefix) = self.longest_announced_prefix(name, face) else {
            callback(SlAnnounceResult::NotFound);
            return;
        };

        if max_lifetime.is_zero() {
            self.remove_route(&prefix, face);
            self.metrics.routes_retired.increment();
            callback(SlAnnounceResult::Ok);
            return;
        }

        // The entry is known to exist; look it up again to appease the
        // borrow checker after longest_announced_prefix.
        let Some(entry) = self.entries.get_mut(&prefix) else {
            callback(SlAnnounceResult::NotFound);
            return;
        };
        let Some(route) = entry.route_on_mut(face) else {
            callback(SlAnnounceResult::NotFound);
            return;
        };

        let validity = route
            .announcement
            .as_ref()
            .map(|pa| pa.expiration())
            .unwrap_or(max_lifetime);
        route.expiry = Some(Instant::now() + max_lifetime.min(validity));
        trace!("Renewed route {prefix} via face={face}");
        self.metrics.routes_renewed.increment();
        callback(SlAnnounceResult::Ok);
    }

    /// Finds the Prefix Announcement for the innermost announced prefix of
    /// `name`.
    pub fn sl_find_ann(&self, name: &Name, callback: impl FnOnce(Option<PrefixAnnouncement>)) {
        let mut best: Option<&PrefixAnnouncement> = None;
        let mut best_len = 0;
        for entry in self.entries.values() {
            if !entry.name.is_prefix_of(name) {
                continue;
            }
            let Some(pa) = entry
                .routes
                .iter()
                .find_map(|route| route.announcement.as_ref())
            else {
                continue;
            };
            if best.is_none() || entry.name.len() > best_len {
                best_len = entry.name.len();
                best = Some(pa);
            }
        }

        trace!(
            "PA lookup for {name}: {}",
            if best.is_some() { "found" } else { "none" }
        );
        callback(best.cloned());
    }

    /// Retires routes whose lifetime has elapsed.
    pub fn expire_routes(&mut self, now: Instant) {
        let mut removed = Vec::new();
        for entry in self.entries.values_mut() {
            entry.routes.retain(|route| {
                if route.is_expired(now) {
                    removed.push((entry.name.clone(), route.face));
                    false
                } else {
                    true
                }
            });
        }
        self.entries.retain(|_, entry| !entry.routes.is_empty());

        for (name, face) in removed {
            debug!("Route {name} via face={face} expired");
            self.metrics.routes_retired.increment();
            self.push_fib_update(FibUpdate::Remove { name, face });
        }
    }

    /// Signature verification hook. Announcement signatures are accepted as
    /// opaque here; deployments hook a validator into the RIB, not into the
    /// forwarding strategy.
    fn validate(&self, _pa: &PrefixAnnouncement) -> bool {
        true
    }

    fn longest_announced_prefix(&self, name: &Name, face: FaceId) -> Option<Name> {
        self.entries
            .values()
            .filter(|entry| entry.name.is_prefix_of(name))
            .filter(|entry| {
                entry
                    .route_on(face)
                    .map(|route| route.origin == RouteOrigin::PrefixAnn)
                    .unwrap_or(false)
            })
            .max_by_key(|entry| entry.name.len())
            .map(|entry| entry.name.clone())
    }

    fn remove_route(&mut self, name: &Name, face: FaceId) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.routes.retain(|route| route.face != face);
            if entry.routes.is_empty() {
                self.entries.remove(name);
            }
        }
        debug!("Retired route {name} via face={face}");
        self.push_fib_update(FibUpdate::Remove {
            name: name.clone(),
            face,
        });
    }

    fn push_fib_update(&self, update: FibUpdate) {
        if self.fib_tx.send(update).is_err() {
            warn!("Forwarding loop gone, dropping FIB update");
        }
    }

    #[cfg(test)]
    fn entry(&self, name: &Name) -> Option<&RibEntry> {
        self.entries.get(name)
    }
}
