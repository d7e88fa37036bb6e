//! Tensor storage adapter.
//!
//! Caller data, constants and intermediate results all pass through
//! [`Tensor`]. Only `int32` data can be handed to a kernel; every other
//! dtype is carried so it can be rejected with a precise error.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::types::{element_count, Shape};

/// Element type of a tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[default]
    Int32,
    Int8,
    Int64,
    Float32,
}

impl DType {
    /// Element type spelled the way generated source declares it.
    pub fn c_type(&self) -> &'static str {
        match self {
            DType::Int32 => "int",
            DType::Int8 => "int8_t",
            DType::Int64 => "int64_t",
            DType::Float32 => "float",
        }
    }

    /// Returns true for the single dtype kernels accept.
    pub fn is_supported(&self) -> bool {
        matches!(self, DType::Int32)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Int32 => "int32",
            DType::Int8 => "int8",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
        };
        f.write_str(name)
    }
}

/// Typed element storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum TensorData {
    Int32(Vec<i32>),
    Int8(Vec<i8>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
}

impl TensorData {
    /// Returns the dtype of the stored elements.
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::Int32(_) => DType::Int32,
            TensorData::Int8(_) => DType::Int8,
            TensorData::Int64(_) => DType::Int64,
            TensorData::Float32(_) => DType::Float32,
        }
    }

    /// Returns the number of stored elements.
    pub fn len(&self) -> usize {
        match self {
            TensorData::Int32(v) => v.len(),
            TensorData::Int8(v) => v.len(),
            TensorData::Int64(v) => v.len(),
            TensorData::Float32(v) => v.len(),
        }
    }

    /// Returns true if no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dense row-major tensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Dimensions
    pub shape: Shape,
    /// Element storage
    pub data: TensorData,
}

impl Tensor {
    /// Creates an `int32` tensor, checking the element count against `shape`.
    pub fn from_i32(shape: impl Into<Shape>, values: Vec<i32>) -> Result<Self> {
        Self::new(shape, TensorData::Int32(values))
    }

    /// Creates a tensor, checking the element count against `shape`.
    pub fn new(shape: impl Into<Shape>, data: TensorData) -> Result<Self> {
        let shape = shape.into();
        let expected = element_count(&shape);
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                context: format!("tensor of shape {:?}", shape),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Creates a zero-filled `int32` tensor.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let len = element_count(&shape);
        Self {
            shape,
            data: TensorData::Int32(vec![0; len]),
        }
    }

    /// Returns the element type.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the elements as `i32`.
    pub fn as_i32(&self) -> Result<&[i32]> {
        match &self.data {
            TensorData::Int32(values) => Ok(values),
            other => Err(Error::UnsupportedDType {
                dtype: other.dtype(),
                context: format!("tensor of shape {:?}", self.shape),
            }),
        }
    }

    /// Consumes the tensor, returning its `i32` elements.
    pub fn into_i32(self) -> Result<Vec<i32>> {
        match self.data {
            TensorData::Int32(values) => Ok(values),
            other => Err(Error::UnsupportedDType {
                dtype: other.dtype(),
                context: format!("tensor of shape {:?}", self.shape),
            }),
        }
    }
}
