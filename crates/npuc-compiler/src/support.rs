//! NPU operator support matrix.

use npuc_opt::OpsetSupport;

use crate::config::CompilerType;

/// Opset the plugin-internal compiler is built against.
pub const MLIR_OPSET: u32 = 11;

/// Operator types the NPU compilers know how to lower, with the opset that
/// introduced each one.
const KNOWN_OPS: &[(&str, u32)] = &[
    ("Add", 1),
    ("Constant", 1),
    ("Convert", 1),
    ("Divide", 1),
    ("Floor", 1),
    ("FloorMod", 1),
    ("Gather", 1),
    ("Interpolate", 1),
    ("Multiply", 1),
    ("Relu", 1),
    ("ShapeOf", 1),
];

/// Snapshot of what one compiler accepts, taken at the start of a compile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub compiler: CompilerType,
    /// Newest opset the compiler accepts.
    pub opset: u32,
}

impl Capabilities {
    pub fn new(compiler: CompilerType, opset: u32) -> Self {
        Self { compiler, opset }
    }

    /// Whether `op_type` is known at all at this opset.
    pub fn knows(&self, op_type: &str) -> bool {
        KNOWN_OPS
            .iter()
            .any(|&(name, since)| name == op_type && since <= self.opset)
    }

    pub fn known_ops(&self) -> impl Iterator<Item = &'static str> + '_ {
        KNOWN_OPS
            .iter()
            .filter(|&&(_, since)| since <= self.opset)
            .map(|&(name, _)| name)
    }
}

impl OpsetSupport for Capabilities {
    fn backend_name(&self) -> &str {
        self.compiler.as_str()
    }

    fn max_supported_version(&self, op_type: &str) -> u32 {
        if self.knows(op_type) { self.opset } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_caps_known_ops_at_opset() {
        let caps = Capabilities::new(CompilerType::Driver, 10);
        assert_eq!(caps.max_supported_version("Interpolate"), 10);
        assert_eq!(caps.max_supported_version("Gather"), 10);
        assert_eq!(caps.backend_name(), "DRIVER");
    }

    #[test]
    fn unknown_op_unsupported() {
        let caps = Capabilities::new(CompilerType::Mlir, MLIR_OPSET);
        assert_eq!(caps.max_supported_version("FakeOp"), 0);
        assert!(!caps.knows("FakeOp"));
        assert!(caps.known_ops().any(|op| op == "ShapeOf"));
    }
}
