//! Round-robin proxy rotation with per-run failure accounting.
//!
//! Result sites rate-limit aggressively, so each fetch goes out through the
//! next healthy proxy identity. An identity that keeps failing is pulled
//! from rotation for the rest of the run; when the pool is empty the
//! rotator degrades to direct connections instead of stalling the pipeline.
//!
//! The rotator holds all mutable state (cursor and failure counters) and is
//! shared behind an async mutex; [`crate::config::ProxyIdentity`] stays a
//! plain config record.

use tracing::{info, warn};

use crate::config::ProxyIdentity;

/// Where a request should egress from.
#[derive(Debug, Clone)]
pub enum Egress {
    /// No proxy: connect directly.
    Direct,
    Proxy(ProxyIdentity),
}

impl Egress {
    /// Label for logs and failure reports.
    pub fn label(&self) -> String {
        match self {
            Egress::Direct => "direct".to_string(),
            Egress::Proxy(identity) => identity.label(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    identity: ProxyIdentity,
    failures: u32,
    disabled: bool,
}

/// Rotates over healthy proxy identities, disabling ones that cross the
/// failure threshold.
#[derive(Debug)]
pub struct ProxyRotator {
    slots: Vec<Slot>,
    cursor: usize,
    failure_threshold: u32,
}

impl ProxyRotator {
    /// Build a rotator from configured identities. Identities disabled in
    /// config never enter rotation.
    pub fn new(identities: &[ProxyIdentity], failure_threshold: u32) -> Self {
        let slots = identities
            .iter()
            .filter(|p| p.enabled)
            .map(|identity| Slot {
                identity: identity.clone(),
                failures: 0,
                disabled: false,
            })
            .collect();
        Self {
            slots,
            cursor: 0,
            failure_threshold,
        }
    }

    /// Hand out the next healthy identity, or [`Egress::Direct`] when the
    /// pool is exhausted.
    pub fn next(&mut self) -> Egress {
        let active = self.active_count();
        if active == 0 {
            return Egress::Direct;
        }
        // At most one full lap; active > 0 guarantees a hit.
        for _ in 0..self.slots.len() {
            let slot = &self.slots[self.cursor];
            self.cursor = (self.cursor + 1) % self.slots.len();
            if !slot.disabled {
                return Egress::Proxy(slot.identity.clone());
            }
        }
        Egress::Direct
    }

    /// Record a transport failure against `label`. Crossing the threshold
    /// disables the identity for the rest of the run.
    pub fn report_failure(&mut self, label: &str) {
        let threshold = self.failure_threshold;
        if let Some(slot) = self.slot_mut(label) {
            slot.failures += 1;
            if !slot.disabled && slot.failures >= threshold {
                slot.disabled = true;
                warn!(
                    proxy = label,
                    failures = slot.failures,
                    "proxy disabled for this run"
                );
            }
        }
        let remaining = self.active_count();
        if remaining == 0 {
            info!("proxy pool exhausted, falling back to direct connections");
        }
    }

    /// A successful fetch through `label` clears its failure streak.
    pub fn report_success(&mut self, label: &str) {
        if let Some(slot) = self.slot_mut(label) {
            slot.failures = 0;
        }
    }

    /// Identities still in rotation.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.disabled).count()
    }

    fn slot_mut(&mut self, label: &str) -> Option<&mut Slot> {
        self.slots
            .iter_mut()
            .find(|s| s.identity.label() == label)
    }
}
