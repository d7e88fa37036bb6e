//! Hardware model interface.
//!
//! A hardware model is a cycle-accurate simulation of a synthesizable design
//! exposing a register-style port set: clock, reset, an opcode selecting
//! read or write, a register group `id`, an `addr` within the group, an
//! input data bus and an output data bus.
//!
//! Models only react when [`HardwareModel::eval`] is called; setting ports
//! alone has no effect. The [`SignalDriver`](crate::driver::SignalDriver)
//! is the only component that talks to a model.

use serde::{Deserialize, Serialize};

use crate::types::{Addr, RegisterId};

/// Operation requested on the register interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// No register access
    #[default]
    Idle = 0,
    /// Latch `input` into the addressed register
    Write = 1,
    /// Drive the addressed register onto `output`
    Read = 2,
}

/// Input ports of a hardware model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ports {
    pub clock: bool,
    pub reset: bool,
    pub opcode: Opcode,
    pub id: RegisterId,
    pub addr: Addr,
    pub input: i32,
}

/// One register transaction.
///
/// Transactions have no identity of their own; they only describe the
/// arguments of a single synchronous driver call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Read { id: RegisterId, addr: Addr },
    Write { id: RegisterId, addr: Addr, value: i32 },
}

impl Transaction {
    /// Returns the opcode this transaction drives.
    pub fn opcode(&self) -> Opcode {
        match self {
            Transaction::Read { .. } => Opcode::Read,
            Transaction::Write { .. } => Opcode::Write,
        }
    }
}

/// A simulated device instance.
///
/// Instances are exclusively owned and strictly sequential: nothing in this
/// crate shares a model between threads of control.
pub trait HardwareModel: Send {
    /// Short name of the design.
    fn name(&self) -> &str;

    /// Mutable access to the input ports.
    fn ports_mut(&mut self) -> &mut Ports;

    /// Settles the design for the current port values.
    fn eval(&mut self);

    /// Current value of the output data bus.
    fn output(&self) -> i32;

    /// The simulation's own completion signal.
    ///
    /// Once raised, reset and run loops stop early.
    fn finished(&self) -> bool {
        false
    }
}

impl HardwareModel for Box<dyn HardwareModel> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ports_mut(&mut self) -> &mut Ports {
        (**self).ports_mut()
    }

    fn eval(&mut self) {
        (**self).eval()
    }

    fn output(&self) -> i32 {
        (**self).output()
    }

    fn finished(&self) -> bool {
        (**self).finished()
    }
}
