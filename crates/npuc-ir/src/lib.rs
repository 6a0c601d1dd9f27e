//! Operator graph IR for the NPU compiler adapter.
//!
//! A model is an [`OperatorGraph`]: a DAG of [`GraphNode`]s, each carrying
//! an [`OpKind`] and the opset version it was taken from, connected by
//! typed tensor edges.

mod display;
mod error;
pub mod graph;
mod op;
mod rewrite;
mod types;
pub mod validate;

pub use display::{dump_graph, format_node};
pub use error::IrError;
pub use graph::{EdgeId, GraphNode, NodeId, OperatorGraph, TensorInfo};
pub use op::{
    ConstantData, CoordinateTransformMode, InterpolateAttrs, InterpolateMode, NearestMode, OpKind,
    ShapeCalcMode,
};
pub use rewrite::{PortRef, Replacement, ReplacementNode};
pub use types::{Bytes, Dimension, Scalar, ScalarKind, TensorShape};
