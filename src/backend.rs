//! Backend facade tying configuration, models and both execution paths.
//!
//! A [`Backend`] offers the two ways a subgraph reaches the hardware:
//!
//! - [`Backend::compile`] - ahead-of-time, returns generated source calling
//!   the `add` entry point
//! - [`Backend::load`] - ahead-of-load, returns a [`SubgraphRuntime`] driving
//!   a kernel built from the configuration

use std::sync::Arc;

use crate::codegen::{generate, GeneratedModule};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::graph::Subgraph;
use crate::kernel::{build_kernel, Kernel};
use crate::profiler::Profiler;
use crate::registry::{create_default_registry, ModelRegistry};
use crate::runtime::SubgraphRuntime;

/// Entry point for compiling and loading subgraphs.
#[derive(Debug)]
pub struct Backend {
    config: BridgeConfig,
    registry: ModelRegistry,
    profiler: Arc<Profiler>,
}

impl Backend {
    /// Creates a backend with the built-in hardware models.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::with_registry(config, create_default_registry())
    }

    /// Creates a backend resolving models from `registry`.
    pub fn with_registry(config: BridgeConfig, registry: ModelRegistry) -> Result<Self> {
        config.validate()?;
        let profiler = Arc::new(Profiler::new(
            config.profiler.enable,
            config.profiler.cycle_counter_id,
        ));
        tracing::info!(
            mode = ?config.kernel.mode,
            model = %config.device.model,
            profiler = config.profiler.enable,
            "backend created"
        );
        Ok(Self {
            config,
            registry,
            profiler,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Returns the profiler shared by every kernel this backend builds.
    pub fn profiler(&self) -> Arc<Profiler> {
        Arc::clone(&self.profiler)
    }

    /// Generates source for `graph` exported as `symbol`.
    pub fn compile(&self, graph: &Subgraph, symbol: &str) -> Result<GeneratedModule> {
        generate(graph, symbol, &self.config.codegen)
    }

    /// Builds a fresh kernel per the configuration.
    pub fn kernel(&self) -> Result<Box<dyn Kernel>> {
        build_kernel(&self.config, &self.registry, self.profiler())
    }

    /// Loads `graph` into an interpreter with its own kernel instance.
    pub fn load(&self, graph: &Subgraph, symbol: &str) -> Result<SubgraphRuntime> {
        SubgraphRuntime::new(symbol, graph, self.kernel()?)
    }
}
