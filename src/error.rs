//! Error types for dispatch, code generation and graph execution.
//!
//! Every variant describes either an unsupported feature or a malformed
//! input graph. None of them is transient and none is retried.

use thiserror::Error;

use crate::config::ConfigError;
use crate::tensor::DType;
use crate::types::NodeId;

/// Errors produced by the bridge.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported dtype {dtype} for {context}, only int32 is supported")]
    UnsupportedDType { dtype: DType, context: String },

    #[error("Nested tuples are not supported (node {node})")]
    UnsupportedTupleNesting { node: NodeId },

    #[error("Index {index} out of range for {len} outputs of node {node}")]
    IndexOutOfRange {
        node: NodeId,
        index: usize,
        len: usize,
    },

    #[error("The number of input constants ({actual}) must match the number required ({expected})")]
    ConstantCountMismatch { expected: usize, actual: usize },

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Shape mismatch for {context}: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Expected {expected} inputs, got {actual}")]
    InputCountMismatch { expected: usize, actual: usize },

    #[error("Runtime for {0} has not been initialized")]
    NotInitialized(String),

    #[error("Runtime for {0} is already initialized")]
    AlreadyInitialized(String),

    #[error("Unknown hardware model: {0}")]
    UnknownModel(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
