//! Mock model wrappers for testing.
//!
//! These wrap a real model and add predictable observation or termination
//! behavior, useful for checking the driver's sequencing protocol.

use crate::device::{HardwareModel, Ports};

/// Raises the completion signal after a fixed number of rising clock edges.
#[derive(Debug)]
pub struct FinishAfter<M> {
    inner: M,
    limit: u64,
    edges: u64,
    last_clock: bool,
}

impl<M: HardwareModel> FinishAfter<M> {
    /// Wraps `inner`, finishing once `limit` rising edges have been seen.
    pub fn new(inner: M, limit: u64) -> Self {
        Self {
            inner,
            limit,
            edges: 0,
            last_clock: false,
        }
    }

    /// Number of rising edges observed so far.
    pub fn edges(&self) -> u64 {
        self.edges
    }

    /// Returns the wrapped model.
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: HardwareModel> HardwareModel for FinishAfter<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn ports_mut(&mut self) -> &mut Ports {
        self.inner.ports_mut()
    }

    fn eval(&mut self) {
        let clock = self.inner.ports_mut().clock;
        if clock && !self.last_clock {
            self.edges += 1;
        }
        self.last_clock = clock;
        self.inner.eval();
    }

    fn output(&self) -> i32 {
        self.inner.output()
    }

    fn finished(&self) -> bool {
        self.edges >= self.limit
    }
}

/// Port levels seen by one `eval` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortSample {
    pub clock: bool,
    pub reset: bool,
}

/// Records the clock and reset levels at every evaluation.
#[derive(Debug)]
pub struct TraceProbe<M> {
    inner: M,
    samples: Vec<PortSample>,
}

impl<M: HardwareModel> TraceProbe<M> {
    /// Wraps `inner` with an empty trace.
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            samples: Vec::new(),
        }
    }

    /// The samples recorded so far, one per `eval`.
    pub fn samples(&self) -> &[PortSample] {
        &self.samples
    }

    /// Discards recorded samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Indices of evaluations at which the clock rose.
    pub fn rising_edges(&self) -> Vec<usize> {
        let mut last = false;
        let mut edges = Vec::new();
        for (i, s) in self.samples.iter().enumerate() {
            if s.clock && !last {
                edges.push(i);
            }
            last = s.clock;
        }
        edges
    }
}

impl<M: HardwareModel> HardwareModel for TraceProbe<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn ports_mut(&mut self) -> &mut Ports {
        self.inner.ports_mut()
    }

    fn eval(&mut self) {
        let ports = self.inner.ports_mut();
        self.samples.push(PortSample {
            clock: ports.clock,
            reset: ports.reset,
        });
        self.inner.eval();
    }

    fn output(&self) -> i32 {
        self.inner.output()
    }

    fn finished(&self) -> bool {
        self.inner.finished()
    }
}
