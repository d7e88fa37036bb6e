//! Built-in hardware models.
//!
//! # Available Models
//!
//! - [`ScalarAdder`] - One-element-per-cycle adder behind a register interface
//!
//! ## Test Models (mock)
//! - [`FinishAfter`] - Raises the completion signal after N rising clock edges
//! - [`TraceProbe`] - Records clock/reset levels at every evaluation

pub mod mock;
pub mod scalar_adder;

pub use mock::{FinishAfter, PortSample, TraceProbe};
pub use scalar_adder::ScalarAdder;
