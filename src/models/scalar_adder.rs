//! Scalar adder design.
//!
//! Register map:
//!
//! | id | register |
//! |----|----------|
//! | 0  | operand a (write) |
//! | 1  | operand b (write) |
//! | 2  | result y (read) |
//! | 3  | cycle counter (read) |
//!
//! Writes latch combinationally on `eval`. On each rising clock edge the
//! design either clears every register (reset high) or computes
//! `y <= a + b` and bumps the cycle counter.

use crate::device::{HardwareModel, Opcode, Ports};
use crate::kernel::{OPERAND_A, OPERAND_B, RESULT};
use crate::types::RegisterId;

/// Register group exposing the number of non-reset rising edges.
pub const CYCLE_COUNTER: RegisterId = 3;

/// Behavioral model of the scalar adder.
#[derive(Debug, Default)]
pub struct ScalarAdder {
    ports: Ports,
    last_clock: bool,
    a: i32,
    b: i32,
    y: i32,
    cycles: i32,
    out: i32,
}

impl ScalarAdder {
    /// Creates a model in its power-on state.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, id: RegisterId) -> i32 {
        match id {
            OPERAND_A => self.a,
            OPERAND_B => self.b,
            RESULT => self.y,
            CYCLE_COUNTER => self.cycles,
            _ => 0,
        }
    }
}

impl HardwareModel for ScalarAdder {
    fn name(&self) -> &str {
        "scalar_adder"
    }

    fn ports_mut(&mut self) -> &mut Ports {
        &mut self.ports
    }

    fn eval(&mut self) {
        let rising = self.ports.clock && !self.last_clock;
        self.last_clock = self.ports.clock;

        if rising {
            if self.ports.reset {
                self.a = 0;
                self.b = 0;
                self.y = 0;
                self.cycles = 0;
            } else {
                self.y = self.a.wrapping_add(self.b);
                self.cycles = self.cycles.wrapping_add(1);
            }
        }

        match self.ports.opcode {
            Opcode::Write if !self.ports.reset => match self.ports.id {
                OPERAND_A => self.a = self.ports.input,
                OPERAND_B => self.b = self.ports.input,
                _ => {}
            },
            Opcode::Read => self.out = self.register(self.ports.id),
            _ => {}
        }
    }

    fn output(&self) -> i32 {
        self.out
    }
}
