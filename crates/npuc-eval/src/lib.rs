//! Reference evaluator for operator graphs.
//!
//! Executes an [`OperatorGraph`] on the CPU with `ndarray`, one node at a
//! time in topological order. It exists to check that a downgraded graph
//! computes the same values as the original, not to be fast.

pub mod interpolate;

use std::collections::HashMap;

use ndarray::{Array1, ArrayD, Axis, IxDyn, Zip};
use npuc_ir::{
    ConstantData, EdgeId, GraphNode, IrError, OpKind, OperatorGraph, Scalar, ShapeCalcMode,
};

/// A runtime tensor value.
#[derive(Clone, Debug, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
}

impl Tensor {
    /// Element type of the value.
    pub fn scalar(&self) -> Scalar {
        match self {
            Self::F32(_) => Scalar::F32,
            Self::I64(_) => Scalar::I64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F32(a) => a.shape(),
            Self::I64(a) => a.shape(),
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::F32(a) => Some(a),
            Self::I64(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Self::I64(a) => Some(a),
            Self::F32(_) => None,
        }
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(value: ArrayD<f32>) -> Self {
        Self::F32(value)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(value: ArrayD<i64>) -> Self {
        Self::I64(value)
    }
}

/// Errors raised while evaluating a graph.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// A graph input was not supplied.
    #[error("no value supplied for graph input {0}")]
    MissingInput(EdgeId),
    /// An edge was read before anything wrote it.
    #[error("edge {0} has no value")]
    MissingValue(EdgeId),
    /// A node could not be evaluated.
    #[error("node '{node}': {reason}")]
    Node { node: String, reason: String },
    #[error(transparent)]
    Ir(#[from] IrError),
}

/// Evaluate `graph` and return the values of its outputs, in order.
///
/// The graph is validated first, so every node has the inputs its operator
/// version requires.
pub fn evaluate(
    graph: &OperatorGraph,
    inputs: &[(EdgeId, Tensor)],
) -> Result<Vec<Tensor>, EvalError> {
    graph.validate()?;
    let mut values: HashMap<EdgeId, Tensor> = inputs.iter().cloned().collect();
    if let Some(&missing) = graph.inputs.iter().find(|e| !values.contains_key(e)) {
        return Err(EvalError::MissingInput(missing));
    }

    for node in graph.topological_order()? {
        let args = node
            .inputs
            .iter()
            .map(|e| values.get(e).ok_or(EvalError::MissingValue(*e)))
            .collect::<Result<Vec<_>, _>>()?;
        let out = eval_node(graph, node, &args).map_err(|reason| EvalError::Node {
            node: node.name.clone(),
            reason,
        })?;
        log::trace!("{} -> {:?}", node.name, out.shape());
        let &[output] = node.outputs.as_slice() else {
            return Err(EvalError::Node {
                node: node.name.clone(),
                reason: format!("expected one output, found {}", node.outputs.len()),
            });
        };
        values.insert(output, out);
    }

    graph
        .outputs
        .iter()
        .map(|e| values.get(e).cloned().ok_or(EvalError::MissingValue(*e)))
        .collect()
}

/// Largest element-wise relative difference, or `None` if the shapes differ.
///
/// The difference is scaled by the larger magnitude of the two elements;
/// two zeros compare equal.
pub fn max_relative_error(a: &ArrayD<f32>, b: &ArrayD<f32>) -> Option<f32> {
    if a.shape() != b.shape() {
        return None;
    }
    Some(a.iter().zip(b.iter()).fold(0.0f32, |worst, (&x, &y)| {
        let scale = x.abs().max(y.abs());
        let rel = if scale == 0.0 { 0.0 } else { (x - y).abs() / scale };
        worst.max(rel)
    }))
}

fn eval_node(graph: &OperatorGraph, node: &GraphNode, args: &[&Tensor]) -> Result<Tensor, String> {
    match &node.op {
        OpKind::Constant(data) => constant(graph, node, data),
        OpKind::ShapeOf => {
            let shape: Vec<i64> = args[0].shape().iter().map(|&d| d as i64).collect();
            Ok(Tensor::I64(Array1::from(shape).into_dyn()))
        }
        OpKind::Gather { batch_dims } => {
            if *batch_dims != 0 {
                return Err(format!("batch_dims={batch_dims} is not implemented"));
            }
            gather(args[0], i64_arg(args[1], "indices")?, i64_arg(args[2], "axis")?)
        }
        OpKind::Convert { destination } => match (args[0], destination.is_float()) {
            (Tensor::F32(a), true) => Ok(Tensor::F32(a.clone())),
            (Tensor::I64(a), true) => Ok(Tensor::F32(a.mapv(|v| v as f32))),
            // Truncation toward zero.
            (Tensor::F32(a), false) if destination.is_integer() => {
                Ok(Tensor::I64(a.mapv(|v| v as i64)))
            }
            (Tensor::I64(a), false) if destination.is_integer() => Ok(Tensor::I64(a.clone())),
            _ => Err(format!("cannot convert to {destination}")),
        },
        OpKind::Add => binary(args, |x, y| Ok(x + y), |x, y| Ok(x + y)),
        OpKind::Multiply => binary(args, |x, y| Ok(x * y), |x, y| Ok(x * y)),
        OpKind::Divide => binary(args, |x, y| Ok(x / y), floor_div),
        OpKind::FloorMod => binary(args, |x, y| Ok(x - (x / y).floor() * y), floor_mod),
        OpKind::Floor => Ok(match args[0] {
            Tensor::F32(a) => Tensor::F32(a.mapv(f32::floor)),
            Tensor::I64(a) => Tensor::I64(a.clone()),
        }),
        OpKind::Relu => Ok(match args[0] {
            Tensor::F32(a) => Tensor::F32(a.mapv(|v| v.max(0.0))),
            Tensor::I64(a) => Tensor::I64(a.mapv(|v| v.max(0))),
        }),
        OpKind::Interpolate(attrs) => {
            let data = args[0]
                .as_f32()
                .ok_or("Interpolate data must be f32")?;
            let (sizes, scales, axes) = if node.version >= 11 {
                match attrs.shape_calculation_mode {
                    ShapeCalcMode::Sizes => {
                        (Some(i64_arg(args[1], "sizes")?), None, args.get(2))
                    }
                    ShapeCalcMode::Scales => {
                        (None, Some(f32_arg(args[1], "scales")?), args.get(2))
                    }
                }
            } else if node.version >= 4 {
                (
                    Some(i64_arg(args[1], "sizes")?),
                    Some(f32_arg(args[2], "scales")?),
                    args.get(3),
                )
            } else {
                return Err(format!("Interpolate-v{} is not implemented", node.version));
            };

            let rank = data.ndim();
            let axes: Vec<usize> = match axes {
                Some(t) => i64_arg(t, "axes")?
                    .iter()
                    .map(|&a| normalize_axis(a, rank))
                    .collect::<Result<_, _>>()?,
                None => (0..rank).collect(),
            };
            let padded: Vec<usize> = (0..rank)
                .map(|i| {
                    data.shape()[i]
                        + attrs.pads_begin.get(i).copied().unwrap_or(0)
                        + attrs.pads_end.get(i).copied().unwrap_or(0)
                })
                .collect();

            let sizes = sizes.map(|a| a.iter().copied().collect::<Vec<_>>());
            let scales = scales.map(|a| a.iter().copied().collect::<Vec<_>>());
            let plans = interpolate::plan_axes(
                attrs,
                &padded,
                &axes,
                sizes.as_deref(),
                scales.as_deref(),
            )?;
            interpolate::interpolate(data, attrs, &plans).map(Tensor::F32)
        }
        OpKind::Custom { op_type } => Err(format!("no reference implementation for {op_type}")),
    }
}

fn constant(graph: &OperatorGraph, node: &GraphNode, data: &ConstantData) -> Result<Tensor, String> {
    let shape = node
        .outputs
        .first()
        .and_then(|&e| graph.edge(e))
        .and_then(|info| info.shape.fixed_dims())
        .map(|dims| dims.into_iter().map(|d| d as usize).collect::<Vec<_>>())
        .unwrap_or_else(|| vec![data.len()]);
    let shaped = |n: usize| -> Result<IxDyn, String> {
        if shape.iter().product::<usize>() == n {
            Ok(IxDyn(&shape))
        } else {
            Err(format!("{n} value(s) do not fill shape {shape:?}"))
        }
    };
    match data {
        ConstantData::F32(v) => ArrayD::from_shape_vec(shaped(v.len())?, v.clone())
            .map(Tensor::F32)
            .map_err(|e| e.to_string()),
        ConstantData::I64(v) => ArrayD::from_shape_vec(shaped(v.len())?, v.clone())
            .map(Tensor::I64)
            .map_err(|e| e.to_string()),
    }
}

fn f32_arg<'t>(t: &'t Tensor, what: &str) -> Result<&'t ArrayD<f32>, String> {
    t.as_f32()
        .ok_or_else(|| format!("{what} must be f32, found {}", t.scalar()))
}

fn i64_arg<'t>(t: &'t Tensor, what: &str) -> Result<&'t ArrayD<i64>, String> {
    t.as_i64()
        .ok_or_else(|| format!("{what} must be i64, found {}", t.scalar()))
}

fn normalize_axis(axis: i64, rank: usize) -> Result<usize, String> {
    let resolved = if axis < 0 { axis + rank as i64 } else { axis };
    if (0..rank as i64).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(format!("axis {axis} out of range for rank {rank}"))
    }
}

fn gather(data: &Tensor, indices: &ArrayD<i64>, axis: &ArrayD<i64>) -> Result<Tensor, String> {
    let axis = *axis.iter().next().ok_or("axis input is empty")?;
    let axis = normalize_axis(axis, data.shape().len())?;
    let len = data.shape()[axis] as i64;
    let picked = indices
        .iter()
        .map(|&i| {
            let j = if i < 0 { i + len } else { i };
            if (0..len).contains(&j) {
                Ok(j as usize)
            } else {
                Err(format!("index {i} out of range for dimension of {len}"))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    let scalar_index = match indices.ndim() {
        0 => true,
        1 => false,
        n => return Err(format!("rank-{n} indices are not implemented")),
    };

    fn take<T: Clone>(a: &ArrayD<T>, axis: usize, idx: &[usize], scalar: bool) -> ArrayD<T> {
        if scalar {
            a.index_axis(Axis(axis), idx[0]).to_owned()
        } else {
            a.select(Axis(axis), idx)
        }
    }

    Ok(match data {
        Tensor::F32(a) => Tensor::F32(take(a, axis, &picked, scalar_index)),
        Tensor::I64(a) => Tensor::I64(take(a, axis, &picked, scalar_index)),
    })
}

/// NumPy-style broadcast of two shapes.
fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    (0..rank)
        .map(|i| {
            let da = if i + a.len() >= rank { a[i + a.len() - rank] } else { 1 };
            let db = if i + b.len() >= rank { b[i + b.len() - rank] } else { 1 };
            match (da, db) {
                (x, y) if x == y => Some(x),
                (1, y) => Some(y),
                (x, 1) => Some(x),
                _ => None,
            }
        })
        .collect()
}

fn zip_broadcast<T: Copy>(
    a: &ArrayD<T>,
    b: &ArrayD<T>,
    f: impl Fn(T, T) -> Result<T, String>,
) -> Result<ArrayD<T>, String> {
    let shape = broadcast_shape(a.shape(), b.shape())
        .ok_or_else(|| format!("shapes {:?} and {:?} do not broadcast", a.shape(), b.shape()))?;
    let shape = IxDyn(&shape);
    let (Some(av), Some(bv)) = (a.broadcast(shape.clone()), b.broadcast(shape)) else {
        return Err("broadcast failed".into());
    };
    let mut err = None;
    let out = Zip::from(&av).and(&bv).map_collect(|&x, &y| {
        f(x, y).unwrap_or_else(|e| {
            err.get_or_insert(e);
            x
        })
    });
    match err {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

fn binary(
    args: &[&Tensor],
    f32_op: impl Fn(f32, f32) -> Result<f32, String>,
    i64_op: impl Fn(i64, i64) -> Result<i64, String>,
) -> Result<Tensor, String> {
    match (args[0], args[1]) {
        (Tensor::F32(a), Tensor::F32(b)) => zip_broadcast(a, b, f32_op).map(Tensor::F32),
        (Tensor::I64(a), Tensor::I64(b)) => zip_broadcast(a, b, i64_op).map(Tensor::I64),
        (a, b) => Err(format!(
            "mixed element types {} and {}",
            a.scalar(),
            b.scalar()
        )),
    }
}

fn floor_div(x: i64, y: i64) -> Result<i64, String> {
    if y == 0 {
        return Err("integer division by zero".into());
    }
    let q = x / y;
    Ok(if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q })
}

fn floor_mod(x: i64, y: i64) -> Result<i64, String> {
    if y == 0 {
        return Err("integer modulo by zero".into());
    }
    let r = x % y;
    Ok(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
}
