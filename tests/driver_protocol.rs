//! Integration tests for the signal driver protocol.
//!
//! These tests verify:
//! - Clock and reset timing within reset/run windows
//! - Reset followed by run matches reset alone on the register file
//! - Early exit when the model raises its completion signal
//! - Registry-created models behind the driver

use std::collections::HashMap;

use rtlbridge::device::{HardwareModel, Ports, Transaction};
use rtlbridge::driver::{Advance, SignalDriver};
use rtlbridge::models::{FinishAfter, ScalarAdder, TraceProbe};
use rtlbridge::registry::create_default_registry;

// ============================================================================
// Test Models
// ============================================================================

/// Shift register: every rising edge shifts `input` into a 4-deep history.
#[derive(Default)]
struct ShiftModel {
    ports: Ports,
    last_clock: bool,
    history: [i32; 4],
    out: i32,
}

impl HardwareModel for ShiftModel {
    fn name(&self) -> &str {
        "shift"
    }

    fn ports_mut(&mut self) -> &mut Ports {
        &mut self.ports
    }

    fn eval(&mut self) {
        let rising = self.ports.clock && !self.last_clock;
        self.last_clock = self.ports.clock;
        if rising {
            if self.ports.reset {
                self.history = [0; 4];
            } else {
                self.history.rotate_right(1);
                self.history[0] = self.ports.input;
            }
        }
        let idx = self.ports.id.clamp(0, 3) as usize;
        self.out = self.history[idx];
    }

    fn output(&self) -> i32 {
        self.out
    }
}

fn registers<M: HardwareModel>(
    driver: &mut SignalDriver<M>,
    ids: std::ops::Range<i32>,
) -> Vec<i32> {
    ids.map(|id| driver.read(id, 0)).collect()
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn test_reset_window_timing() {
    let mut driver = SignalDriver::new(TraceProbe::new(ScalarAdder::new()));
    let advance = driver.reset(3);

    assert_eq!(
        advance,
        Advance {
            cycles: 3,
            time_units: 30,
            finished: false
        }
    );

    let samples = driver.model().samples();
    assert_eq!(samples.len(), 30);
    assert_eq!(driver.model().rising_edges(), vec![1, 11, 21]);
    assert!(samples[..6].iter().all(|s| s.reset));
    assert!(samples[6..].iter().all(|s| !s.reset));
}

#[test]
fn test_each_call_has_its_own_time_base() {
    let mut driver = SignalDriver::new(TraceProbe::new(ScalarAdder::new()));
    driver.run(2);
    driver.model_mut().clear();
    driver.run(2);

    // the second call restarts at unit 0 instead of continuing at 20
    assert_eq!(driver.model().rising_edges(), vec![1, 11]);
    assert!(driver.model().samples().iter().all(|s| !s.reset));
}

#[test]
fn test_write_does_not_clock() {
    let mut driver = SignalDriver::new(TraceProbe::new(ScalarAdder::new()));
    driver.write(0, 0, 9);
    driver.write(1, 0, 1);
    assert_eq!(driver.read(2, 0), 0);
    assert!(driver.model().rising_edges().is_empty());

    driver.run(1);
    assert_eq!(driver.read(2, 0), 10);
}

// ============================================================================
// Reset / Run Oracle
// ============================================================================

#[test]
fn test_reset_then_run_matches_reset_only() {
    for budget in 1..=4 {
        let mut reset_only = SignalDriver::new(ScalarAdder::new());
        reset_only.write(0, 0, 5);
        reset_only.reset(budget);

        let mut reset_run = SignalDriver::new(ScalarAdder::new());
        reset_run.write(0, 0, 5);
        reset_run.reset(budget);
        reset_run.run(budget);

        assert_eq!(
            registers(&mut reset_only, 0..3),
            registers(&mut reset_run, 0..3),
            "budget {}",
            budget
        );
    }
}

#[test]
fn test_shift_model_sequencing() {
    let mut driver = SignalDriver::new(ShiftModel::default());
    driver.reset(1);

    for value in [1, 2, 3] {
        driver.write(0, 0, value);
        driver.run(1);
    }
    assert_eq!(registers(&mut driver, 0..4), vec![3, 2, 1, 0]);

    driver.reset(1);
    assert_eq!(registers(&mut driver, 0..4), vec![0, 0, 0, 0]);
}

// ============================================================================
// Early Termination
// ============================================================================

#[test]
fn test_early_finish_during_reset() {
    let model = TraceProbe::new(FinishAfter::new(ScalarAdder::new(), 3));
    let mut driver = SignalDriver::new(model);
    let advance = driver.reset(10);

    assert_eq!(advance.cycles, 3);
    assert!(advance.finished);
    assert!(advance.time_units < 100);
    assert_eq!(driver.stats().early_exits, 1);

    let samples = driver.model().samples();
    assert!(samples[..6].iter().all(|s| s.reset));
    assert!(samples[6..].iter().all(|s| !s.reset));
    assert_eq!(driver.model().rising_edges(), vec![1, 11, 21]);

    // a finished model stays finished: run returns immediately
    let advance = driver.run(5);
    assert_eq!(advance.cycles, 0);
    assert_eq!(advance.time_units, 0);
    assert!(advance.finished);
}

#[test]
fn test_transactions_and_stats() {
    let mut driver = SignalDriver::new(ScalarAdder::new());
    driver.reset(1);
    assert_eq!(driver.transact(Transaction::Write { id: 0, addr: 0, value: 40 }), None);
    assert_eq!(driver.transact(Transaction::Write { id: 1, addr: 0, value: 2 }), None);
    driver.run(1);
    assert_eq!(driver.transact(Transaction::Read { id: 2, addr: 0 }), Some(42));

    let stats = driver.export_stats();
    assert_eq!(stats["model"], "scalar_adder");
    assert_eq!(stats["reset_calls"], 1);
    assert_eq!(stats["run_calls"], 1);
    assert_eq!(stats["writes"], 2);
    assert_eq!(stats["reads"], 1);
    assert_eq!(stats["cycles"], 2);
}

#[test]
fn test_registry_model_behind_driver() {
    let registry = create_default_registry();
    let model = registry.create("scalar_adder", &HashMap::new()).unwrap();
    let mut driver = SignalDriver::new(model);

    driver.reset(1);
    driver.write(0, 0, -7);
    driver.write(1, 0, 3);
    driver.run(1);
    assert_eq!(driver.read(2, 0), -4);
}
