//! Configuration system for the bridge.
//!
//! This module provides YAML/JSON configuration file support for selecting
//! the kernel strategy, the hardware model, profiling and code generation
//! options.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! log_level: info
//!
//! kernel:
//!   mode: hardware
//!   reset_cycles: 1
//!   run_cycles: 1
//!
//! device:
//!   model: scalar_adder
//!   attrs: {}
//!
//! profiler:
//!   enable: true
//!   cycle_counter_id: 3
//!
//! codegen:
//!   kernel_header: rtlbridge/kernel.h
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::types::{CycleBudget, RegisterId};

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Register groups the kernel itself uses for operands and result.
const KERNEL_REGISTER_GROUPS: [RegisterId; 3] = [0, 1, 2];

/// Which kernel strategy computes operators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelMode {
    /// Pure software reference computation
    Software,
    /// Drive the hardware model through the signal driver
    #[default]
    Hardware,
}

/// Kernel dispatch parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Kernel strategy
    #[serde(default)]
    pub mode: KernelMode,

    /// Cycles spent in reset before each operator
    #[serde(default = "default_cycles")]
    pub reset_cycles: CycleBudget,

    /// Cycles run between writing operands and reading the result
    #[serde(default = "default_cycles")]
    pub run_cycles: CycleBudget,
}

fn default_cycles() -> CycleBudget {
    1
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mode: KernelMode::default(),
            reset_cycles: default_cycles(),
            run_cycles: default_cycles(),
        }
    }
}

/// Hardware model selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Registered model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Attributes passed to the model factory
    #[serde(default)]
    pub attrs: HashMap<String, String>,
}

fn default_model() -> String {
    "scalar_adder".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            attrs: HashMap::new(),
        }
    }
}

/// Cycle profiling options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Whether hardware kernels sample the cycle counter
    #[serde(default)]
    pub enable: bool,

    /// Register group holding the device cycle counter
    #[serde(default = "default_cycle_counter_id")]
    pub cycle_counter_id: RegisterId,
}

fn default_cycle_counter_id() -> RegisterId {
    3
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enable: false,
            cycle_counter_id: default_cycle_counter_id(),
        }
    }
}

/// Code generation options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Header declaring the kernel entry points
    #[serde(default = "default_kernel_header")]
    pub kernel_header: String,
}

fn default_kernel_header() -> String {
    "rtlbridge/kernel.h".to_string()
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            kernel_header: default_kernel_header(),
        }
    }
}

/// Complete bridge configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub kernel: KernelConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub profiler: ProfilerConfig,

    #[serde(default)]
    pub codegen: CodegenConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            kernel: KernelConfig::default(),
            device: DeviceConfig::default(),
            profiler: ProfilerConfig::default(),
            codegen: CodegenConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: BridgeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.kernel.reset_cycles == 0 {
            return Err(ConfigError::Validation(
                "kernel.reset_cycles must be at least 1".to_string(),
            ));
        }
        if self.kernel.run_cycles == 0 {
            return Err(ConfigError::Validation(
                "kernel.run_cycles must be at least 1".to_string(),
            ));
        }
        if self.device.model.is_empty() {
            return Err(ConfigError::Validation(
                "device.model must not be empty".to_string(),
            ));
        }
        if self.profiler.enable {
            if KERNEL_REGISTER_GROUPS.contains(&self.profiler.cycle_counter_id) {
                return Err(ConfigError::Validation(format!(
                    "profiler.cycle_counter_id {} collides with a kernel register group",
                    self.profiler.cycle_counter_id
                )));
            }
            if self.kernel.mode == KernelMode::Software {
                tracing::warn!(
                    "Profiler enabled with software kernel (no cycles will be recorded)"
                );
            }
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for creating BridgeConfig programmatically.
#[derive(Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the kernel strategy.
    pub fn kernel_mode(mut self, mode: KernelMode) -> Self {
        self.config.kernel.mode = mode;
        self
    }

    /// Sets the reset budget used before each operator.
    pub fn reset_cycles(mut self, cycles: CycleBudget) -> Self {
        self.config.kernel.reset_cycles = cycles;
        self
    }

    /// Sets the run budget used per element.
    pub fn run_cycles(mut self, cycles: CycleBudget) -> Self {
        self.config.kernel.run_cycles = cycles;
        self
    }

    /// Selects the hardware model.
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.config.device.model = name.into();
        self
    }

    /// Adds a model factory attribute.
    pub fn model_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.device.attrs.insert(key.into(), value.into());
        self
    }

    /// Enables cycle profiling from the given register group.
    pub fn profiler(mut self, cycle_counter_id: RegisterId) -> Self {
        self.config.profiler.enable = true;
        self.config.profiler.cycle_counter_id = cycle_counter_id;
        self
    }

    /// Sets the kernel header included by generated code.
    pub fn kernel_header(mut self, header: impl Into<String>) -> Self {
        self.config.codegen.kernel_header = header.into();
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<BridgeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
