//! Simulated network conditions.

use keypool_core::NetworkConditionProbe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// [`NetworkConditionProbe`] with a switchable metered flag.
#[derive(Debug, Default)]
pub struct SimNetwork {
    metered: AtomicBool,
    probes: AtomicU64,
}

impl SimNetwork {
    pub fn new(metered: bool) -> Self {
        Self {
            metered: AtomicBool::new(metered),
            probes: AtomicU64::new(0),
        }
    }

    pub fn set_metered(&self, metered: bool) {
        self.metered.store(metered, Ordering::SeqCst);
    }

    /// Number of times the provisioner asked.
    pub fn probes(&self) -> u64 {
        self.probes.load(Ordering::SeqCst)
    }
}

impl NetworkConditionProbe for SimNetwork {
    fn is_metered(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.metered.load(Ordering::SeqCst)
    }
}
