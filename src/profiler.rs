//! Cycle profiling for hardware-backed kernels.
//!
//! A [`Profiler`] is shared (via `Arc`) between every kernel built by one
//! backend and the caller that inspects it. When enabled, the hardware
//! kernel reads the device cycle counter after each operator and records it
//! here.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::RegisterId;

/// Accumulated profile counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    /// Device cycles summed over all profiled operator calls
    pub cycle_counter: u64,
    /// Number of profiled operator calls
    pub kernel_calls: u64,
    /// Number of tensor elements processed
    pub elements: u64,
}

/// Thread-safe profile accumulator.
#[derive(Debug)]
pub struct Profiler {
    enabled: bool,
    cycle_counter_id: RegisterId,
    stats: Mutex<ProfileStats>,
}

impl Profiler {
    /// Creates a profiler reading cycles from register group `cycle_counter_id`.
    pub fn new(enabled: bool, cycle_counter_id: RegisterId) -> Self {
        Self {
            enabled,
            cycle_counter_id,
            stats: Mutex::new(ProfileStats::default()),
        }
    }

    /// Creates a profiler that records nothing.
    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    /// Returns true if kernels should sample the cycle counter.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register group holding the device cycle counter.
    pub fn cycle_counter_id(&self) -> RegisterId {
        self.cycle_counter_id
    }

    /// Records one operator call.
    pub fn record(&self, cycles: u64, elements: u64) {
        if !self.enabled {
            return;
        }
        let mut stats = self.stats.lock();
        stats.cycle_counter += cycles;
        stats.kernel_calls += 1;
        stats.elements += elements;
    }

    /// Resets all counters to zero.
    pub fn clear(&self) {
        *self.stats.lock() = ProfileStats::default();
    }

    /// Returns a snapshot of the counters.
    pub fn snapshot(&self) -> ProfileStats {
        self.stats.lock().clone()
    }

    /// Returns the counters as JSON.
    pub fn status(&self) -> serde_json::Value {
        let stats = self.snapshot();
        serde_json::json!({
            "cycle_counter": stats.cycle_counter,
            "kernel_calls": stats.kernel_calls,
            "elements": stats.elements,
        })
    }

    /// Writes the counters to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::disabled()
    }
}
