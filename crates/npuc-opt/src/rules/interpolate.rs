//! Interpolate-11 → Interpolate-4.
//!
//! Interpolate-11 takes a single `scales_or_sizes` input whose meaning is
//! selected by `shape_calculation_mode`. Interpolate-4 wants both `sizes`
//! and `scales`, so the missing one is recomputed from the runtime shape of
//! `data`:
//!
//! ```text
//! dims   = Convert<f32>(Gather(ShapeOf(data), axes, 0))   // or ShapeOf(data) without axes
//! scales mode: sizes  = Convert<i64>(Floor(dims * Convert<f32>(scales) + 1e-5))
//! sizes mode:  scales = Convert<f32>(sizes) / dims
//! ```
//!
//! The helper operators use the newest version the backend accepts. Below
//! Gather-8 negative indices are not allowed, so the axes are first wrapped
//! with `FloorMod(axes, rank)`.

use npuc_ir::{
    ConstantData, Dimension, GraphNode, OpKind, OperatorGraph, PortRef, Replacement, Scalar,
    ShapeCalcMode, TensorInfo, TensorShape,
};

use super::{DowngradeRule, RuleKey};
use crate::{OpsetSupport, RuleError};

/// Epsilon added before flooring `dim * scale`, matching Interpolate shape inference.
const SCALES_EPSILON: f32 = 1.0e-5;

/// ShapeOf versions, newest first.
const SHAPE_OF_VERSIONS: &[u32] = &[3, 1];
/// Gather versions, newest first. Only v8 accepts negative indices.
const GATHER_VERSIONS: &[u32] = &[8, 1];
const NEGATIVE_INDEX_GATHER: u32 = 8;
const BASE_VERSION: u32 = 1;

/// Newest of `versions` that `support` accepts for `op_type`, else the oldest.
fn pick_version(support: &dyn OpsetSupport, op_type: &str, versions: &[u32]) -> u32 {
    let ceiling = support.max_supported_version(op_type);
    versions
        .iter()
        .copied()
        .find(|&v| v <= ceiling)
        .or_else(|| versions.last().copied())
        .unwrap_or(BASE_VERSION)
}

/// Rewrites Interpolate-11 into Interpolate-4 plus a small shape subgraph.
#[derive(Debug)]
pub struct Interpolate11To4;

impl DowngradeRule for Interpolate11To4 {
    fn name(&self) -> &'static str {
        "interpolate11-to-interpolate4"
    }

    fn source(&self) -> RuleKey {
        RuleKey {
            op_type: "Interpolate",
            version: 11,
        }
    }

    fn target_version(&self) -> u32 {
        4
    }

    fn rewrite(
        &self,
        graph: &OperatorGraph,
        node: &GraphNode,
        support: &dyn OpsetSupport,
    ) -> Result<Replacement, RuleError> {
        let OpKind::Interpolate(attrs) = &node.op else {
            return Err(RuleError::NotApplicable(format!(
                "expected Interpolate, found {}",
                node.op_type()
            )));
        };
        if attrs.is_pillow() {
            return Err(RuleError::NotApplicable(format!(
                "mode '{}' has no Interpolate-4 equivalent",
                attrs.mode
            )));
        }
        if !(2..=3).contains(&node.inputs.len()) {
            return Err(RuleError::NotApplicable(format!(
                "expected 2 or 3 inputs, found {}",
                node.inputs.len()
            )));
        }

        let data = input_info(graph, node, 0)?;
        let scales_or_sizes = input_info(graph, node, 1)?;
        let has_axes = node.inputs.len() == 3;

        match attrs.shape_calculation_mode {
            ShapeCalcMode::Scales if !scales_or_sizes.scalar.is_float() => {
                return Err(RuleError::NotApplicable(format!(
                    "scales input must be floating point, found {}",
                    scales_or_sizes.scalar
                )));
            }
            ShapeCalcMode::Sizes if !scales_or_sizes.scalar.is_integer() => {
                return Err(RuleError::NotApplicable(format!(
                    "sizes input must be integer, found {}",
                    scales_or_sizes.scalar
                )));
            }
            _ => {}
        }

        // Length of the per-axis vectors.
        let (axis_count, axes_scalar) = if has_axes {
            let axes = input_info(graph, node, 2)?;
            if !axes.scalar.is_integer() {
                return Err(RuleError::NotApplicable(format!(
                    "axes input must be integer, found {}",
                    axes.scalar
                )));
            }
            let count = axes.shape.dims.first().cloned().unwrap_or(Dimension::Fixed(1));
            (count, axes.scalar)
        } else {
            (Dimension::Fixed(data.shape.rank() as u32), Scalar::I64)
        };
        let vector = |scalar: Scalar, suffix: &str| {
            TensorInfo::new(
                format!("{}/{suffix}", node.name),
                scalar,
                TensorShape {
                    dims: vec![axis_count.clone()],
                },
            )
        };
        let name = |suffix: &str| format!("{}/{suffix}", node.name);

        let mut rep = Replacement::default();

        // Runtime extents of the interpolated axes, as f32.
        let rank = data.shape.rank() as u32;
        let shape = rep.edge(TensorInfo::new(
            name("shape_of"),
            Scalar::I64,
            TensorShape::fixed(&[rank]),
        ));
        rep.node(
            OpKind::ShapeOf,
            pick_version(support, "ShapeOf", SHAPE_OF_VERSIONS),
            vec![PortRef::Input(0)],
            shape,
            name("shape_of"),
        );
        let dims = if has_axes {
            let gather_version = pick_version(support, "Gather", GATHER_VERSIONS);
            let indices = if gather_version >= NEGATIVE_INDEX_GATHER {
                PortRef::Input(2)
            } else {
                let rank_const = rep.edge(TensorInfo::new(
                    name("rank"),
                    Scalar::I64,
                    TensorShape::fixed(&[]),
                ));
                rep.node(
                    OpKind::Constant(ConstantData::I64(vec![i64::from(rank)])),
                    BASE_VERSION,
                    vec![],
                    rank_const,
                    name("rank"),
                );
                let axes_i64 = if axes_scalar == Scalar::I64 {
                    PortRef::Input(2)
                } else {
                    let converted = rep.edge(vector(Scalar::I64, "axes_i64"));
                    rep.node(
                        OpKind::Convert {
                            destination: Scalar::I64,
                        },
                        BASE_VERSION,
                        vec![PortRef::Input(2)],
                        converted,
                        name("axes_i64"),
                    );
                    converted
                };
                let wrapped = rep.edge(vector(Scalar::I64, "axes_wrapped"));
                rep.node(
                    OpKind::FloorMod,
                    BASE_VERSION,
                    vec![axes_i64, rank_const],
                    wrapped,
                    name("axes_wrapped"),
                );
                wrapped
            };
            let gather_axis = rep.edge(TensorInfo::new(
                name("gather_axis"),
                Scalar::I64,
                TensorShape::fixed(&[]),
            ));
            rep.node(
                OpKind::Constant(ConstantData::I64(vec![0])),
                BASE_VERSION,
                vec![],
                gather_axis,
                name("gather_axis"),
            );
            let gathered = rep.edge(vector(Scalar::I64, "axes_dims"));
            rep.node(
                OpKind::Gather { batch_dims: 0 },
                gather_version,
                vec![shape, indices, gather_axis],
                gathered,
                name("axes_dims"),
            );
            gathered
        } else {
            shape
        };
        let dims_f32 = rep.edge(vector(Scalar::F32, "dims_f32"));
        rep.node(
            OpKind::Convert {
                destination: Scalar::F32,
            },
            BASE_VERSION,
            vec![dims],
            dims_f32,
            name("dims_f32"),
        );

        let (sizes, scales) = match attrs.shape_calculation_mode {
            ShapeCalcMode::Scales => {
                let scales_f32 = if scales_or_sizes.scalar == Scalar::F32 {
                    PortRef::Input(1)
                } else {
                    let converted = rep.edge(vector(Scalar::F32, "scales_f32"));
                    rep.node(
                        OpKind::Convert {
                            destination: Scalar::F32,
                        },
                        BASE_VERSION,
                        vec![PortRef::Input(1)],
                        converted,
                        name("scales_f32"),
                    );
                    converted
                };
                let scaled = rep.edge(vector(Scalar::F32, "scaled"));
                rep.node(
                    OpKind::Multiply,
                    BASE_VERSION,
                    vec![dims_f32, scales_f32],
                    scaled,
                    name("scaled"),
                );
                let eps = rep.edge(TensorInfo::new(
                    name("epsilon"),
                    Scalar::F32,
                    TensorShape::fixed(&[]),
                ));
                rep.node(
                    OpKind::Constant(ConstantData::F32(vec![SCALES_EPSILON])),
                    BASE_VERSION,
                    vec![],
                    eps,
                    name("epsilon"),
                );
                let nudged = rep.edge(vector(Scalar::F32, "nudged"));
                rep.node(
                    OpKind::Add,
                    BASE_VERSION,
                    vec![scaled, eps],
                    nudged,
                    name("nudged"),
                );
                let floored = rep.edge(vector(Scalar::F32, "floored"));
                rep.node(
                    OpKind::Floor,
                    BASE_VERSION,
                    vec![nudged],
                    floored,
                    name("floored"),
                );
                let sizes = rep.edge(vector(Scalar::I64, "sizes"));
                rep.node(
                    OpKind::Convert {
                        destination: Scalar::I64,
                    },
                    BASE_VERSION,
                    vec![floored],
                    sizes,
                    name("sizes"),
                );
                (sizes, PortRef::Input(1))
            }
            ShapeCalcMode::Sizes => {
                let sizes_f32 = rep.edge(vector(Scalar::F32, "sizes_f32"));
                rep.node(
                    OpKind::Convert {
                        destination: Scalar::F32,
                    },
                    BASE_VERSION,
                    vec![PortRef::Input(1)],
                    sizes_f32,
                    name("sizes_f32"),
                );
                let scales = rep.edge(vector(Scalar::F32, "scales"));
                rep.node(
                    OpKind::Divide,
                    BASE_VERSION,
                    vec![sizes_f32, dims_f32],
                    scales,
                    name("scales"),
                );
                (PortRef::Input(1), scales)
            }
        };

        let mut inputs = vec![PortRef::Input(0), sizes, scales];
        if has_axes {
            inputs.push(PortRef::Input(2));
        }
        rep.node(
            OpKind::Interpolate(attrs.clone()),
            self.target_version(),
            inputs,
            PortRef::Output(0),
            node.name.clone(),
        );

        Ok(rep)
    }
}

fn input_info<'g>(
    graph: &'g OperatorGraph,
    node: &GraphNode,
    i: usize,
) -> Result<&'g TensorInfo, RuleError> {
    graph
        .edge(node.inputs[i])
        .ok_or_else(|| RuleError::NotApplicable(format!("input {i} is not registered")))
}
