//! Core type definitions shared by the driver, dispatcher and graph layers.

/// Simulation time unit used inside a single reset/run window.
///
/// Each call owns its own time base starting at 0; time is never carried
/// across calls.
pub type SimTime = u64;

/// Number of logical clock cycles a reset or run call may consume.
pub type CycleBudget = u64;

/// Index of a node inside a serialized subgraph.
pub type NodeId = usize;

/// Logical register group selector on the device interface.
pub type RegisterId = i32;

/// Offset within a register group.
pub type Addr = i32;

/// Tensor dimensions, row-major.
pub type Shape = Vec<usize>;

/// Simulation time units per logical clock cycle.
pub const UNITS_PER_CYCLE: SimTime = 10;

/// Unit offset within a cycle at which the clock goes high.
pub const CLOCK_RISE_OFFSET: SimTime = 1;

/// Unit offset within a cycle at which the clock goes low (and reset is released).
pub const CLOCK_FALL_OFFSET: SimTime = 6;

/// Total number of elements described by `shape`.
///
/// A rank-0 shape describes a single scalar.
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count() {
        assert_eq!(element_count(&[2, 2]), 4);
        assert_eq!(element_count(&[8, 4]), 32);
        assert_eq!(element_count(&[1, 112, 112, 32]), 401_408);
        assert_eq!(element_count(&[]), 1);
        assert_eq!(element_count(&[3, 0]), 0);
    }

    #[test]
    fn test_cycle_offsets() {
        assert!(CLOCK_RISE_OFFSET < CLOCK_FALL_OFFSET);
        assert!(CLOCK_FALL_OFFSET < UNITS_PER_CYCLE);
    }
}
