//! # rtlbridge
//!
//! Offloads dataflow-graph operators onto cycle-accurate hardware models.
//!
//! ## Layers
//!
//! - **Signal driver** ([`driver`]): clock/reset sequencing and the
//!   register read/write protocol against a [`HardwareModel`].
//! - **Kernel dispatch** ([`kernel`]): maps a tensor operator over its index
//!   space, one write/write/run/read block per element. A software
//!   reference kernel computes the same results without a device.
//! - **Code generation** ([`codegen`]): turns a [`Subgraph`] into C++ source
//!   calling the kernel entry points.
//! - **Interpretation** ([`runtime`]): executes a [`Subgraph`] directly.
//!
//! ## Quick Start
//!
//! ```rust
//! use rtlbridge::{Backend, BridgeConfig, DType, SubgraphBuilder, Tensor};
//!
//! let mut builder = SubgraphBuilder::new();
//! let x = builder.add_input("x", vec![2, 2], DType::Int32);
//! let y = builder.add_input("y", vec![2, 2], DType::Int32);
//! let z = builder.add_kernel("add", &[x, y], vec![vec![2, 2]], DType::Int32);
//! builder.mark_output(z);
//! let graph = builder.build().unwrap();
//!
//! let backend = Backend::new(BridgeConfig::default()).unwrap();
//!
//! // Ahead-of-time: generated source
//! let module = backend.compile(&graph, "sub0").unwrap();
//! assert!(module.source.contains("add(x, y, buf_0, 2, 2);"));
//!
//! // Ahead-of-load: interpreter driving the hardware model
//! let mut runtime = backend.load(&graph, "sub0").unwrap();
//! runtime.init(&[]).unwrap();
//! let a = Tensor::from_i32(vec![2, 2], vec![1, 2, 3, 4]).unwrap();
//! let b = Tensor::from_i32(vec![2, 2], vec![10, 20, 30, 40]).unwrap();
//! let out = runtime.run(&[a, b]).unwrap();
//! assert_eq!(out[0].as_i32().unwrap(), &[11, 22, 33, 44]);
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use rtlbridge::config::BridgeConfig;
//!
//! let config = BridgeConfig::from_yaml_file("bridge.yaml")?;
//! let backend = rtlbridge::Backend::new(config)?;
//! ```

pub mod types;
pub mod error;
pub mod tensor;
pub mod device;
pub mod driver;
pub mod models;
pub mod registry;
pub mod config;
pub mod profiler;
pub mod op;
pub mod kernel;
pub mod graph;
pub mod codegen;
pub mod runtime;
pub mod backend;
pub mod ffi;

// Re-export commonly used types
pub use types::{CycleBudget, NodeId, RegisterId, Shape, SimTime};
pub use error::{Error, Result};
pub use tensor::{DType, Tensor, TensorData};
pub use device::{HardwareModel, Opcode, Ports, Transaction};
pub use driver::{Advance, DriverStats, SignalDriver};
pub use registry::{create_default_registry, ModelRegistry};
pub use config::{BridgeConfig, BridgeConfigBuilder, ConfigError, KernelMode};
pub use profiler::{ProfileStats, Profiler};
pub use op::Operator;
pub use kernel::{execute, HardwareKernel, Kernel, SoftwareKernel};
pub use graph::{NodeEntry, NodeOp, Subgraph, SubgraphBuilder, SubgraphNode};
pub use codegen::{generate, FunctionRecord, GeneratedModule, SubgraphCodegen};
pub use runtime::{RuntimeState, SubgraphRuntime};
pub use backend::Backend;

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// rtlbridge::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
