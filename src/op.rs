//! Supported operator catalogue.
//!
//! Operators form a closed enum. Each variant knows its kernel entry point,
//! its arity, the generation-time shape arguments appended to its call and
//! how to dispatch onto a [`Kernel`]. Adding an operator means adding a
//! variant; unknown names fail with [`Error::UnsupportedOperation`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::types::{element_count, Shape};

/// An operator the bridge can offload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Elementwise addition of two same-shaped tensors
    Add,
}

impl Operator {
    /// Resolves an operator by its graph name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "add" => Ok(Operator::Add),
            other => Err(Error::UnsupportedOperation(other.to_string())),
        }
    }

    /// Graph name of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Add => "add",
        }
    }

    /// Kernel entry point invoked by generated code.
    pub fn entry_point(&self) -> &'static str {
        match self {
            Operator::Add => "add",
        }
    }

    /// Number of tensor operands.
    pub fn arity(&self) -> usize {
        match self {
            Operator::Add => 2,
        }
    }

    /// Generation-time integer arguments appended after the buffers.
    ///
    /// For `add` these are `height, width` of the first operand: leading
    /// dimensions fold into the height, and rank 0 or 1 tensors get a
    /// height of 1.
    pub fn shape_args(&self, input_shapes: &[Shape]) -> Result<Vec<String>> {
        self.check_arity(input_shapes.len())?;
        match self {
            Operator::Add => {
                let (height, width) = matrix_dims(&input_shapes[0]);
                Ok(vec![height.to_string(), width.to_string()])
            }
        }
    }

    /// Checks operand and output shapes of one call.
    ///
    /// `add` is elementwise, so every operand and every output must have
    /// the shape of the first operand.
    pub fn check_shapes(&self, input_shapes: &[Shape], output_shapes: &[Shape]) -> Result<()> {
        self.check_arity(input_shapes.len())?;
        match self {
            Operator::Add => {
                let expected = &input_shapes[0];
                let operands = input_shapes.iter().enumerate().skip(1);
                for (i, shape) in operands {
                    same_shape(&format!("operand {} of {}", i, self), expected, shape)?;
                }
                for (i, shape) in output_shapes.iter().enumerate() {
                    same_shape(&format!("output {} of {}", i, self), expected, shape)?;
                }
                Ok(())
            }
        }
    }

    /// Runs the operator on `kernel`.
    pub fn dispatch<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
        inputs: &[&[i32]],
        out: &mut [i32],
    ) -> Result<()> {
        self.check_arity(inputs.len())?;
        match self {
            Operator::Add => kernel.add(inputs[0], inputs[1], out),
        }
    }

    fn check_arity(&self, actual: usize) -> Result<()> {
        if actual != self.arity() {
            return Err(Error::InputCountMismatch {
                expected: self.arity(),
                actual,
            });
        }
        Ok(())
    }
}

/// Collapses a row-major shape to `(height, width)`.
fn matrix_dims(shape: &[usize]) -> (usize, usize) {
    match shape.split_last() {
        Some((&width, leading)) => (leading.iter().product(), width),
        None => (1, 1),
    }
}

fn same_shape(context: &str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    let (expected_len, actual_len) = (element_count(expected), element_count(actual));
    if expected_len != actual_len {
        return Err(Error::ShapeMismatch {
            context: context.to_string(),
            expected: expected_len,
            actual: actual_len,
        });
    }
    Err(Error::InvalidGraph(format!(
        "{} has shape {:?}, expected {:?}",
        context, actual, expected
    )))
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
