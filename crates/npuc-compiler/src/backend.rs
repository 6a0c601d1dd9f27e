//! Compiler backends.
//!
//! The set of backends is closed, so dispatch is a plain `match` over
//! [`CompilerBackend`] rather than a trait object registry.

use npuc_ir::OperatorGraph;

use crate::config::{CompilerConfig, CompilerType, Platform};
use crate::serialize::{IrBlob, build_ir};
use crate::support::{Capabilities, MLIR_OPSET};
use crate::CompileError;

/// Compiler shipped with the NPU driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverCompiler {
    opset: u32,
    platform: Platform,
}

impl DriverCompiler {
    pub fn new(opset: u32, platform: Platform) -> Self {
        Self { opset, platform }
    }

    /// Ask the driver which opset it supports.
    pub fn capabilities(&self) -> Capabilities {
        log::debug!("driver compiler reports opset {}", self.opset);
        Capabilities::new(CompilerType::Driver, self.opset)
    }

    fn compile(&self, graph: &OperatorGraph, model_name: &str) -> Result<IrBlob, CompileError> {
        build_ir(
            graph,
            model_name,
            &[
                ("compiler", CompilerType::Driver.to_string()),
                ("driver_opset", self.opset.to_string()),
                ("platform", self.platform.to_string()),
            ],
        )
    }
}

/// Graph compiler linked into the plugin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MlirCompiler {
    platform: Platform,
}

impl MlirCompiler {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::new(CompilerType::Mlir, MLIR_OPSET)
    }

    fn compile(&self, graph: &OperatorGraph, model_name: &str) -> Result<IrBlob, CompileError> {
        build_ir(
            graph,
            model_name,
            &[
                ("compiler", CompilerType::Mlir.to_string()),
                ("platform", self.platform.to_string()),
            ],
        )
    }
}

/// The backend selected by [`CompilerType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompilerBackend {
    Driver(DriverCompiler),
    Mlir(MlirCompiler),
}

impl CompilerBackend {
    pub fn from_config(config: &CompilerConfig, platform: Platform) -> Self {
        match config.compiler_type() {
            CompilerType::Driver => Self::Driver(DriverCompiler::new(config.driver_opset(), platform)),
            CompilerType::Mlir => Self::Mlir(MlirCompiler::new(platform)),
        }
    }

    pub fn compiler_type(&self) -> CompilerType {
        match self {
            Self::Driver(_) => CompilerType::Driver,
            Self::Mlir(_) => CompilerType::Mlir,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Driver(_) => "NPU driver compiler",
            Self::Mlir(_) => "NPU MLIR compiler",
        }
    }

    /// Fresh capability snapshot; never cached between compiles.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::Driver(c) => c.capabilities(),
            Self::Mlir(c) => c.capabilities(),
        }
    }

    /// Produce the compiled blob for an already compatible graph.
    pub fn compile(&self, graph: &OperatorGraph, model_name: &str) -> Result<IrBlob, CompileError> {
        match self {
            Self::Driver(c) => c.compile(graph, model_name),
            Self::Mlir(c) => c.compile(graph, model_name),
        }
    }
}
