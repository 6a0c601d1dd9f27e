//! Compiler adapter for NPU targets.
//!
//! [`CompilerAdapter`] picks a backend from the [`CompilerConfig`], asks it
//! which operator versions it accepts, rewrites anything newer through the
//! downgrade engine, and only then hands the graph to the backend.
//!
//! ```text
//! OperatorGraph -> validate -> capabilities -> downgrade -> safety check -> IR blob
//! ```

mod backend;
pub mod config;
mod serialize;
mod support;

use std::fmt;

pub use backend::{CompilerBackend, DriverCompiler, MlirCompiler};
pub use config::{
    CompilerConfig, CompilerType, ConfigError, DEFAULT_DRIVER_OPSET, DEVICE_NPU, Device, LogLevel,
    Platform, parse_option,
};
pub use serialize::{IrBlob, build_ir};
pub use support::{Capabilities, MLIR_OPSET};

use npuc_ir::{IrError, OperatorGraph};
use npuc_opt::{
    DowngradeEngine, DowngradeError, DowngradeRecord, OpsetSupport, RuleTable, first_unsupported,
    max_version_in,
};

/// Name written into the emitted IR.
const MODEL_NAME: &str = "npuc_model";

/// Errors that abort a compile. No artifact is produced on any of them.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// An operator is newer than the backend accepts and cannot be lowered.
    #[error(
        "unsupported operator '{node}' ({op_type}-v{version}) for {backend} (supports up to v{ceiling}): {reason}"
    )]
    UnsupportedOperator {
        node: String,
        op_type: String,
        version: u32,
        ceiling: u32,
        backend: CompilerType,
        reason: String,
    },

    /// No downgrade rule is registered for the operator version.
    #[error(
        "no downgrade rule for '{node}' ({op_type}-v{version}); {backend} supports up to v{ceiling}"
    )]
    NoDowngradeRule {
        node: String,
        op_type: String,
        version: u32,
        ceiling: u32,
        backend: CompilerType,
    },

    /// The graph is malformed, before or after rewriting.
    #[error("graph integrity: {0}")]
    GraphIntegrity(#[from] IrError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backend failed to produce a blob.
    #[error("backend: {0}")]
    Backend(String),
}

impl CompileError {
    fn from_downgrade(err: DowngradeError, backend: CompilerType) -> Self {
        match err {
            DowngradeError::NoDowngradeRule {
                node,
                op_type,
                version,
                ceiling,
            } => Self::NoDowngradeRule {
                node,
                op_type,
                version,
                ceiling,
                backend,
            },
            DowngradeError::UnsupportedOperator {
                node,
                op_type,
                version,
                ceiling,
                reason,
            } => Self::UnsupportedOperator {
                node,
                op_type,
                version,
                ceiling,
                backend,
                reason,
            },
            DowngradeError::Integrity(e) => Self::GraphIntegrity(e),
        }
    }
}

/// What the adapter did to produce an artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilationMetadata {
    /// Backend that compiled the graph.
    pub backend: CompilerType,
    pub platform: Platform,
    /// Human-readable compiler name.
    pub compiler: &'static str,
    /// Opset ceiling the backend reported for this compile.
    pub supported_opset: u32,
    /// Nodes rewritten before compilation, in rewrite order.
    pub downgrades: Vec<DowngradeRecord>,
}

impl fmt::Display for CompilationMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backend={} platform={} opset={} downgrades={}",
            self.backend,
            self.platform,
            self.supported_opset,
            self.downgrades.len()
        )
    }
}

/// Result of a successful compile.
#[derive(Clone, Debug)]
pub struct CompiledArtifact {
    pub metadata: CompilationMetadata,
    /// The graph as handed to the backend, after downgrading.
    pub graph: OperatorGraph,
    pub blob: IrBlob,
}

impl CompiledArtifact {
    /// Highest version of `op_type` in the compiled graph.
    pub fn max_version(&self, op_type: &str) -> Option<u32> {
        max_version_in(&self.graph, op_type)
    }
}

/// Routes compile requests to the configured backend.
///
/// Holds no per-compile state, so one adapter can serve many compiles;
/// each compile owns the graph it is given.
#[derive(Clone, Debug)]
pub struct CompilerAdapter {
    config: CompilerConfig,
    platform: Platform,
    backend: CompilerBackend,
    rules: RuleTable,
}

impl CompilerAdapter {
    pub fn new(config: CompilerConfig) -> Self {
        let platform = config.platform();
        Self::with_platform(config, platform)
    }

    /// Adapter for a device string such as `NPU` or `NPU.3720`.
    ///
    /// A platform in the device string must agree with `NPU_PLATFORM` if
    /// both are given.
    pub fn for_device(device: &str, config: CompilerConfig) -> Result<Self, CompileError> {
        let device: Device = device.parse()?;
        let platform = match (device.platform, config.platform()) {
            (None, configured) => configured,
            (Some(p), Platform::AutoDetect) => p,
            (Some(p), configured) if p == configured => p,
            (Some(p), configured) => {
                return Err(ConfigError::InvalidValue {
                    key: config::KEY_PLATFORM.into(),
                    value: format!("{configured} (device requests {p})"),
                }
                .into());
            }
        };
        Ok(Self::with_platform(config, platform))
    }

    fn with_platform(config: CompilerConfig, platform: Platform) -> Self {
        Self {
            backend: CompilerBackend::from_config(&config, platform),
            config,
            platform,
            rules: RuleTable::builtin(),
        }
    }

    /// Replace the downgrade rule table.
    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn backend(&self) -> &CompilerBackend {
        &self.backend
    }

    /// Downgrade `graph` as needed and compile it.
    pub fn compile(&self, mut graph: OperatorGraph) -> Result<CompiledArtifact, CompileError> {
        graph.validate()?;

        let backend = self.backend.compiler_type();
        let caps = self.backend.capabilities();
        log::info!(
            "compiling {} node(s) with {} (opset {}, platform {})",
            graph.node_count(),
            self.backend.name(),
            caps.opset,
            self.platform
        );

        let report = DowngradeEngine::new(&self.rules)
            .run(&mut graph, &caps)
            .map_err(|e| CompileError::from_downgrade(e, backend))?;

        if let Some(node) = first_unsupported(&graph, &caps) {
            return Err(CompileError::UnsupportedOperator {
                node: node.name.clone(),
                op_type: node.op_type().to_string(),
                version: node.version,
                ceiling: caps.max_supported_version(node.op_type()),
                backend,
                reason: "still unsupported after downgrading".into(),
            });
        }

        let blob = self.backend.compile(&graph, MODEL_NAME)?;
        log::info!(
            "compiled with {} downgrade(s), {} byte blob",
            report.records.len(),
            blob.len()
        );

        Ok(CompiledArtifact {
            metadata: CompilationMetadata {
                backend,
                platform: self.platform,
                compiler: self.backend.name(),
                supported_opset: caps.opset,
                downgrades: report.records,
            },
            graph,
            blob,
        })
    }
}

/// Compile `graph` with a one-off adapter built from `config`.
pub fn compile(graph: OperatorGraph, config: &CompilerConfig) -> Result<CompiledArtifact, CompileError> {
    CompilerAdapter::new(config.clone()).compile(graph)
}
