//! Signal driver: clock/reset sequencing and register access.
//!
//! The driver owns one hardware model and builds four primitives on top of
//! raw port toggling:
//!
//! - [`SignalDriver::reset`] - hold reset for the first half of the first
//!   cycle, then keep clocking until the budget is spent
//! - [`SignalDriver::run`] - clock the design without touching reset
//! - [`SignalDriver::write`] / [`SignalDriver::read`] - one combinational
//!   settle on the register interface, no clock advance
//!
//! # Timing
//!
//! Every logical cycle spans [`UNITS_PER_CYCLE`] time units. The clock
//! rises at unit offset [`CLOCK_RISE_OFFSET`] and falls at
//! [`CLOCK_FALL_OFFSET`]; reset is released at the fall offset of the first
//! cycle. The model is evaluated once per unit.
//!
//! The register bus is idle while the clock runs. Each reset/run call keeps
//! its own local time counter starting at 0, so time is not continuous
//! between calls.
//!
//! ```
//! use rtlbridge::driver::SignalDriver;
//! use rtlbridge::models::ScalarAdder;
//!
//! let mut driver = SignalDriver::new(ScalarAdder::new());
//! driver.reset(1);
//! driver.write(0, 0, 2);
//! driver.write(1, 0, 3);
//! driver.run(1);
//! assert_eq!(driver.read(2, 0), 5);
//! ```

use serde::{Deserialize, Serialize};

use crate::device::{HardwareModel, Opcode, Transaction};
use crate::types::{
    Addr, CycleBudget, RegisterId, SimTime, CLOCK_FALL_OFFSET, CLOCK_RISE_OFFSET, UNITS_PER_CYCLE,
};

/// Outcome of a reset or run call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advance {
    /// Rising clock edges driven
    pub cycles: CycleBudget,
    /// Time units evaluated
    pub time_units: SimTime,
    /// Whether the model raised its completion signal
    pub finished: bool,
}

/// Counters collected by a driver.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DriverStats {
    pub reset_calls: u64,
    pub run_calls: u64,
    pub reads: u64,
    pub writes: u64,
    pub cycles: u64,
    pub early_exits: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Reset,
    Run,
}

/// Drives one exclusively owned hardware model.
#[derive(Debug)]
pub struct SignalDriver<M> {
    model: M,
    stats: DriverStats,
}

impl<M: HardwareModel> SignalDriver<M> {
    /// Takes ownership of a freshly allocated model.
    pub fn new(model: M) -> Self {
        Self {
            model,
            stats: DriverStats::default(),
        }
    }

    /// Returns the driven model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the driven model mutably.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Releases the model.
    pub fn into_inner(self) -> M {
        self.model
    }

    /// Drives the model into its post-reset state over `budget` cycles.
    ///
    /// Stops early, without error, if the model raises its completion
    /// signal. Reset is always low on return.
    pub fn reset(&mut self, budget: CycleBudget) -> Advance {
        self.stats.reset_calls += 1;
        self.sequence(budget, Phase::Reset)
    }

    /// Clocks the model for `budget` cycles without touching reset.
    pub fn run(&mut self, budget: CycleBudget) -> Advance {
        self.stats.run_calls += 1;
        self.sequence(budget, Phase::Run)
    }

    fn sequence(&mut self, budget: CycleBudget, phase: Phase) -> Advance {
        {
            let ports = self.model.ports_mut();
            ports.clock = false;
            ports.opcode = Opcode::Idle;
            if phase == Phase::Reset {
                ports.reset = true;
            }
        }

        let end = budget.saturating_mul(UNITS_PER_CYCLE);
        let mut time: SimTime = 0;
        let mut cycles: CycleBudget = 0;

        while time < end && !self.model.finished() {
            let ports = self.model.ports_mut();
            match time % UNITS_PER_CYCLE {
                CLOCK_RISE_OFFSET => {
                    ports.clock = true;
                    cycles += 1;
                }
                CLOCK_FALL_OFFSET => {
                    ports.clock = false;
                    if phase == Phase::Reset {
                        ports.reset = false;
                    }
                }
                _ => {}
            }
            self.model.eval();
            time += 1;
        }

        if phase == Phase::Reset {
            self.model.ports_mut().reset = false;
        }

        let finished = self.model.finished();
        self.stats.cycles += cycles;
        if finished && time < end {
            self.stats.early_exits += 1;
            tracing::debug!(
                model = self.model.name(),
                ?phase,
                cycles,
                budget,
                "model finished before cycle budget was spent"
            );
        } else {
            tracing::trace!(model = self.model.name(), ?phase, cycles, "sequence complete");
        }

        Advance {
            cycles,
            time_units: time,
            finished,
        }
    }

    /// Writes `value` to register `addr` of group `id`.
    ///
    /// Performs a single evaluation; callers run the clock if the design
    /// needs a cycle for the write to take effect.
    pub fn write(&mut self, id: RegisterId, addr: Addr, value: i32) {
        let ports = self.model.ports_mut();
        ports.opcode = Opcode::Write;
        ports.id = id;
        ports.addr = addr;
        ports.input = value;
        self.model.eval();
        self.stats.writes += 1;
    }

    /// Reads register `addr` of group `id`.
    pub fn read(&mut self, id: RegisterId, addr: Addr) -> i32 {
        let ports = self.model.ports_mut();
        ports.opcode = Opcode::Read;
        ports.id = id;
        ports.addr = addr;
        self.model.eval();
        self.stats.reads += 1;
        self.model.output()
    }

    /// Performs one transaction, returning the value for reads.
    pub fn transact(&mut self, txn: Transaction) -> Option<i32> {
        match txn {
            Transaction::Read { id, addr } => Some(self.read(id, addr)),
            Transaction::Write { id, addr, value } => {
                self.write(id, addr, value);
                None
            }
        }
    }

    /// Returns the collected counters.
    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    /// Exports the collected counters.
    pub fn export_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model.name(),
            "reset_calls": self.stats.reset_calls,
            "run_calls": self.stats.run_calls,
            "reads": self.stats.reads,
            "writes": self.stats.writes,
            "cycles": self.stats.cycles,
            "early_exits": self.stats.early_exits,
        })
    }
}
