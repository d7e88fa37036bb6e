//! Kernel dispatch.
//!
//! A [`Kernel`] computes operators over flat row-major `i32` buffers. Two
//! strategies implement it:
//!
//! - [`SoftwareKernel`] - pure reference computation, no device involved
//! - [`HardwareKernel`] - drives a hardware model through a
//!   [`SignalDriver`], one element per write/write/run/read block
//!
//! The strategy is chosen from [`KernelMode`] in the configuration.
//!
//! # Hardware protocol for `add`
//!
//! ```text
//! reset(reset_cycles)
//! for k in 0..len:
//!     write(id=0, addr=0, a[k])
//!     write(id=1, addr=0, b[k])
//!     run(run_cycles)
//!     out[k] = read(id=2, addr=0)
//! ```

use std::sync::Arc;

use crate::config::{BridgeConfig, KernelMode};
use crate::device::HardwareModel;
use crate::driver::SignalDriver;
use crate::error::{Error, Result};
use crate::op::Operator;
use crate::profiler::Profiler;
use crate::registry::ModelRegistry;
use crate::types::{element_count, CycleBudget, RegisterId};

/// Register group receiving the first operand.
pub const OPERAND_A: RegisterId = 0;
/// Register group receiving the second operand.
pub const OPERAND_B: RegisterId = 1;
/// Register group holding the result.
pub const RESULT: RegisterId = 2;

/// Computes operators over flat `i32` buffers.
pub trait Kernel: Send {
    /// Short strategy name.
    fn name(&self) -> &'static str;

    /// Elementwise `out[k] = a[k] + b[k]`.
    fn add(&mut self, a: &[i32], b: &[i32], out: &mut [i32]) -> Result<()>;
}

fn check_len(context: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch {
            context: context.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_binary(a: &[i32], b: &[i32], out: &[i32]) -> Result<()> {
    check_len("operand b", a.len(), b.len())?;
    check_len("output", a.len(), out.len())
}

/// Reference kernel computing in software.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareKernel;

impl SoftwareKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for SoftwareKernel {
    fn name(&self) -> &'static str {
        "software"
    }

    fn add(&mut self, a: &[i32], b: &[i32], out: &mut [i32]) -> Result<()> {
        check_binary(a, b, out)?;
        for ((y, &x0), &x1) in out.iter_mut().zip(a).zip(b) {
            *y = x0.wrapping_add(x1);
        }
        Ok(())
    }
}

/// Kernel that computes every element on a hardware model.
#[derive(Debug)]
pub struct HardwareKernel<M> {
    driver: SignalDriver<M>,
    reset_cycles: CycleBudget,
    run_cycles: CycleBudget,
    profiler: Arc<Profiler>,
}

impl<M: HardwareModel> HardwareKernel<M> {
    /// Creates a kernel with one reset cycle, one run cycle and no profiling.
    pub fn new(model: M) -> Self {
        Self {
            driver: SignalDriver::new(model),
            reset_cycles: 1,
            run_cycles: 1,
            profiler: Arc::new(Profiler::disabled()),
        }
    }

    /// Sets the reset and run budgets.
    pub fn with_cycles(mut self, reset_cycles: CycleBudget, run_cycles: CycleBudget) -> Self {
        self.reset_cycles = reset_cycles;
        self.run_cycles = run_cycles;
        self
    }

    /// Attaches a shared profiler.
    pub fn with_profiler(mut self, profiler: Arc<Profiler>) -> Self {
        self.profiler = profiler;
        self
    }

    /// Returns the underlying driver.
    pub fn driver(&self) -> &SignalDriver<M> {
        &self.driver
    }

    /// Returns the underlying driver mutably.
    pub fn driver_mut(&mut self) -> &mut SignalDriver<M> {
        &mut self.driver
    }

    fn sample_cycles(&mut self, elements: usize) {
        if !self.profiler.is_enabled() {
            return;
        }
        let cycles = self.driver.read(self.profiler.cycle_counter_id(), 0);
        self.profiler.record(cycles.max(0) as u64, elements as u64);
    }
}

impl<M: HardwareModel> Kernel for HardwareKernel<M> {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn add(&mut self, a: &[i32], b: &[i32], out: &mut [i32]) -> Result<()> {
        check_binary(a, b, out)?;
        tracing::debug!(
            model = self.driver.model().name(),
            elements = out.len(),
            "dispatching add to hardware"
        );

        self.driver.reset(self.reset_cycles);
        for (k, y) in out.iter_mut().enumerate() {
            self.driver.write(OPERAND_A, 0, a[k]);
            self.driver.write(OPERAND_B, 0, b[k]);
            self.driver.run(self.run_cycles);
            *y = self.driver.read(RESULT, 0);
            tracing::trace!(k, a = a[k], b = b[k], y = *y, "element");
        }

        self.sample_cycles(out.len());
        Ok(())
    }
}

/// Executes the operator named `op_name` over tensors of `shape`.
///
/// Every operand and the output must hold exactly the element count of
/// `shape`; element `k` is the row-major linear index.
pub fn execute<K: Kernel + ?Sized>(
    kernel: &mut K,
    op_name: &str,
    operands: &[&[i32]],
    out: &mut [i32],
    shape: &[usize],
) -> Result<()> {
    execute_op(kernel, Operator::from_name(op_name)?, operands, out, shape)
}

/// Executes an already resolved operator over tensors of `shape`.
pub fn execute_op<K: Kernel + ?Sized>(
    kernel: &mut K,
    op: Operator,
    operands: &[&[i32]],
    out: &mut [i32],
    shape: &[usize],
) -> Result<()> {
    let len = element_count(shape);
    for (i, operand) in operands.iter().enumerate() {
        check_len(&format!("operand {} of {}", i, op), len, operand.len())?;
    }
    check_len(&format!("output of {}", op), len, out.len())?;
    op.dispatch(kernel, operands, out)
}

/// Builds the kernel strategy selected by `config`.
pub fn build_kernel(
    config: &BridgeConfig,
    registry: &ModelRegistry,
    profiler: Arc<Profiler>,
) -> Result<Box<dyn Kernel>> {
    match config.kernel.mode {
        KernelMode::Software => Ok(Box::new(SoftwareKernel::new())),
        KernelMode::Hardware => {
            let model = registry.create(&config.device.model, &config.device.attrs)?;
            let kernel = HardwareKernel::new(model)
                .with_cycles(config.kernel.reset_cycles, config.kernel.run_cycles)
                .with_profiler(profiler);
            Ok(Box::new(kernel))
        }
    }
}
