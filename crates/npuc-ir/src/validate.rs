//! Structural integrity checks.
//!
//! A graph that passes [`validate`] has no dangling edges, a single
//! producer per edge, operator arities that match their versions, no
//! cycles, and element types every operator accepts.

use std::collections::{HashMap, HashSet};

use crate::error::IrError;
use crate::graph::{EdgeId, GraphNode, OperatorGraph};
use crate::op::{OpKind, ShapeCalcMode};
use crate::types::Scalar;

/// Check every structural invariant of `graph`.
pub fn validate(graph: &OperatorGraph) -> Result<(), IrError> {
    let mut producers: HashMap<EdgeId, &str> = HashMap::new();
    let mut ids = HashSet::new();

    for node in &graph.nodes {
        if !ids.insert(node.id) {
            return Err(IrError::DuplicateNodeId(node.id));
        }
        for &e in node.inputs.iter().chain(node.outputs.iter()) {
            if !graph.edges.contains_key(&e) {
                return Err(IrError::DanglingEdge {
                    node: node.name.clone(),
                    edge: e,
                });
            }
        }
        for &out in &node.outputs {
            if let Some(first) = producers.insert(out, &node.name) {
                return Err(IrError::DuplicateProducer {
                    edge: out,
                    first: first.to_string(),
                    second: node.name.clone(),
                });
            }
        }

        if let Some(expected) = node.op.arity(node.version)
            && !expected.contains(&node.inputs.len())
        {
            return Err(IrError::BadArity {
                node: node.name.clone(),
                op: node.op_type().to_string(),
                version: node.version,
                what: "inputs",
                expected: format!("{}..={}", expected.start(), expected.end()),
                found: node.inputs.len(),
            });
        }
        if node.op.arity(node.version).is_some() && node.outputs.len() != 1 {
            return Err(IrError::BadArity {
                node: node.name.clone(),
                op: node.op_type().to_string(),
                version: node.version,
                what: "outputs",
                expected: "1".into(),
                found: node.outputs.len(),
            });
        }
    }

    for &e in graph.inputs.iter().chain(graph.outputs.iter()) {
        if !graph.edges.contains_key(&e) {
            return Err(IrError::DanglingEdge {
                node: "<graph>".into(),
                edge: e,
            });
        }
    }

    for node in &graph.nodes {
        for &inp in &node.inputs {
            if !producers.contains_key(&inp) && !graph.inputs.contains(&inp) {
                return Err(IrError::UnproducedEdge {
                    node: node.name.clone(),
                    edge: inp,
                });
            }
        }
    }

    for &out in &graph.outputs {
        if !producers.contains_key(&out) && !graph.inputs.contains(&out) {
            return Err(IrError::UnproducedOutput(out));
        }
    }

    graph.topological_order()?;

    for node in &graph.nodes {
        check_types(graph, node)?;
    }
    Ok(())
}

/// Element-type rules per operator. Arity has already been checked.
fn check_types(graph: &OperatorGraph, node: &GraphNode) -> Result<(), IrError> {
    let scalar = |e: EdgeId| graph.edges.get(&e).map(|info| info.scalar);
    let input = |i: usize| node.inputs.get(i).copied().and_then(scalar);
    let output = node.outputs.first().copied().and_then(scalar);
    let mismatch = |reason: String| IrError::TypeMismatch {
        node: node.name.clone(),
        op: node.op_type().to_string(),
        version: node.version,
        reason,
    };
    let require = |i: usize, what: &str, ok: fn(Scalar) -> bool, kind: &str| match input(i) {
        Some(s) if !ok(s) => Err(mismatch(format!("{what} must be {kind}, found {s}"))),
        _ => Ok(()),
    };
    let float = |i, what| require(i, what, Scalar::is_float, "floating point");
    let integer = |i, what| require(i, what, Scalar::is_integer, "integer");

    match &node.op {
        OpKind::Constant(data) => match output {
            Some(s) if s != data.scalar() => {
                Err(mismatch(format!("{} payload written to a {s} edge", data.scalar())))
            }
            _ => Ok(()),
        },
        OpKind::Convert { destination } => match output {
            Some(s) if s != *destination => {
                Err(mismatch(format!("converts to {destination} but writes a {s} edge")))
            }
            _ => Ok(()),
        },
        OpKind::ShapeOf => match output {
            Some(s) if !s.is_integer() => {
                Err(mismatch(format!("output must be integer, found {s}")))
            }
            _ => Ok(()),
        },
        OpKind::Gather { .. } => {
            integer(1, "indices")?;
            integer(2, "axis")
        }
        OpKind::Add | OpKind::Multiply | OpKind::Divide | OpKind::FloorMod => {
            match (input(0), input(1)) {
                (Some(a), Some(b)) if a != b => Err(mismatch(format!(
                    "operands have different element types {a} and {b}"
                ))),
                _ => Ok(()),
            }
        }
        OpKind::Interpolate(attrs) => {
            float(0, "data")?;
            if node.version >= 11 {
                match attrs.shape_calculation_mode {
                    ShapeCalcMode::Scales => float(1, "scales")?,
                    ShapeCalcMode::Sizes => integer(1, "sizes")?,
                }
                integer(2, "axes")
            } else if node.version >= 4 {
                integer(1, "sizes")?;
                float(2, "scales")?;
                integer(3, "axes")
            } else {
                integer(1, "target shape")
            }
        }
        OpKind::Floor | OpKind::Relu | OpKind::Custom { .. } => Ok(()),
    }
}

impl OperatorGraph {
    /// See [`validate`].
    pub fn validate(&self) -> Result<(), IrError> {
        validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, NodeId, TensorInfo};
    use crate::op::{ConstantData, InterpolateAttrs, OpKind};
    use crate::types::{Scalar, TensorShape};

    fn edge(graph: &mut OperatorGraph, name: &str) -> EdgeId {
        graph.add_edge(TensorInfo::new(name, Scalar::F32, TensorShape::fixed(&[2])))
    }

    #[test]
    fn valid_graph_passes() {
        let mut graph = OperatorGraph::new();
        let x = edge(&mut graph, "x");
        let y = edge(&mut graph, "y");
        graph.inputs = vec![x];
        graph.outputs = vec![y];
        graph
            .add_node(OpKind::Relu, 1, vec![x], vec![y], "relu")
            .unwrap();
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn empty_graph_is_valid() {
        assert!(OperatorGraph::new().validate().is_ok());
    }

    #[test]
    fn consumed_edge_without_producer() {
        let mut graph = OperatorGraph::new();
        let x = edge(&mut graph, "x");
        let y = edge(&mut graph, "y");
        graph.outputs = vec![y];
        graph
            .add_node(OpKind::Relu, 1, vec![x], vec![y], "relu")
            .unwrap();
        assert!(matches!(
            graph.validate(),
            Err(IrError::UnproducedEdge { edge, .. }) if edge == x
        ));
    }

    #[test]
    fn output_without_producer() {
        let mut graph = OperatorGraph::new();
        let y = edge(&mut graph, "y");
        graph.outputs = vec![y];
        assert!(matches!(
            graph.validate(),
            Err(IrError::UnproducedOutput(e)) if e == y
        ));
    }

    #[test]
    fn dangling_edge_detected() {
        let mut graph = OperatorGraph::new();
        let x = edge(&mut graph, "x");
        graph.inputs = vec![x];
        graph.nodes.push(GraphNode {
            id: NodeId(0),
            op: OpKind::Relu,
            version: 1,
            inputs: vec![x],
            outputs: vec![EdgeId(77)],
            name: "relu".into(),
        });
        assert!(matches!(
            graph.validate(),
            Err(IrError::DanglingEdge { edge: EdgeId(77), .. })
        ));
    }

    #[test]
    fn duplicate_node_ids_detected() {
        let mut graph = OperatorGraph::new();
        let x = edge(&mut graph, "x");
        let y = edge(&mut graph, "y");
        let z = edge(&mut graph, "z");
        graph.inputs = vec![x];
        graph.outputs = vec![z];
        graph
            .add_node(OpKind::Relu, 1, vec![x], vec![y], "a")
            .unwrap();
        graph
            .add_node(OpKind::Relu, 1, vec![y], vec![z], "b")
            .unwrap();
        graph.nodes[1].id = graph.nodes[0].id;
        assert!(matches!(
            graph.validate(),
            Err(IrError::DuplicateNodeId(NodeId(0)))
        ));
    }

    #[test]
    fn interpolate11_with_four_inputs_is_rejected() {
        let mut graph = OperatorGraph::new();
        let x = edge(&mut graph, "x");
        let c = edge(&mut graph, "c");
        let y = edge(&mut graph, "y");
        graph.inputs = vec![x];
        graph.outputs = vec![y];
        graph
            .add_node(
                OpKind::Constant(ConstantData::F32(vec![2.0, 2.0])),
                1,
                vec![],
                vec![c],
                "c",
            )
            .unwrap();
        graph
            .add_node(
                OpKind::Interpolate(InterpolateAttrs::default()),
                11,
                vec![x, c, c, c],
                vec![y],
                "resize",
            )
            .unwrap();
        let err = graph.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "node 'resize' (Interpolate-v11) expects 2..=3 inputs, found 4"
        );
    }

    fn typed(graph: &mut OperatorGraph, name: &str, scalar: Scalar) -> EdgeId {
        graph.add_edge(TensorInfo::new(name, scalar, TensorShape::fixed(&[2])))
    }

    /// One node of `op`/`version` over fresh graph inputs of the given types.
    fn single_node(op: OpKind, version: u32, inputs: &[Scalar], output: Scalar) -> OperatorGraph {
        let mut graph = OperatorGraph::new();
        let ins: Vec<EdgeId> = inputs
            .iter()
            .enumerate()
            .map(|(i, &s)| typed(&mut graph, &format!("in{i}"), s))
            .collect();
        let out = typed(&mut graph, "out", output);
        graph.inputs = ins.clone();
        graph.outputs = vec![out];
        graph.add_node(op, version, ins, vec![out], "n").unwrap();
        graph
    }

    fn type_error(graph: &OperatorGraph) -> String {
        match graph.validate() {
            Err(IrError::TypeMismatch { reason, .. }) => reason,
            other => panic!("expected a type mismatch, got {other:?}"),
        }
    }

    #[test]
    fn binary_operands_must_agree() {
        for op in [OpKind::Add, OpKind::Multiply, OpKind::Divide, OpKind::FloorMod] {
            let bad = single_node(op.clone(), 1, &[Scalar::F32, Scalar::F16], Scalar::F32);
            assert_eq!(
                type_error(&bad),
                "operands have different element types f32 and f16"
            );
            let good = single_node(op, 1, &[Scalar::I64, Scalar::I64], Scalar::I64);
            assert!(good.validate().is_ok());
        }
    }

    #[test]
    fn interpolate_data_must_be_float() {
        let graph = single_node(
            OpKind::Interpolate(InterpolateAttrs::default()),
            11,
            &[Scalar::I64, Scalar::I64],
            Scalar::F32,
        );
        assert_eq!(type_error(&graph), "data must be floating point, found i64");
    }

    #[test]
    fn interpolate4_sizes_must_be_integer() {
        let graph = single_node(
            OpKind::Interpolate(InterpolateAttrs::default()),
            4,
            &[Scalar::F32, Scalar::F32, Scalar::F32],
            Scalar::F32,
        );
        assert_eq!(type_error(&graph), "sizes must be integer, found f32");
    }

    #[test]
    fn interpolate4_scales_must_be_float() {
        let graph = single_node(
            OpKind::Interpolate(InterpolateAttrs::default()),
            4,
            &[Scalar::F32, Scalar::I32, Scalar::I64],
            Scalar::F32,
        );
        assert_eq!(type_error(&graph), "scales must be floating point, found i64");

        let ok = single_node(
            OpKind::Interpolate(InterpolateAttrs::default()),
            4,
            &[Scalar::F32, Scalar::I32, Scalar::F16, Scalar::I64],
            Scalar::F32,
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn interpolate11_input_follows_calculation_mode() {
        let scales_mode = OpKind::Interpolate(InterpolateAttrs {
            shape_calculation_mode: ShapeCalcMode::Scales,
            ..Default::default()
        });
        let graph = single_node(scales_mode, 11, &[Scalar::F32, Scalar::I64], Scalar::F32);
        assert_eq!(type_error(&graph), "scales must be floating point, found i64");
    }

    #[test]
    fn constant_and_convert_match_their_edges() {
        let mut graph = OperatorGraph::new();
        let c = typed(&mut graph, "c", Scalar::F32);
        graph.outputs = vec![c];
        graph
            .add_node(
                OpKind::Constant(ConstantData::I64(vec![1, 2])),
                1,
                vec![],
                vec![c],
                "c",
            )
            .unwrap();
        assert_eq!(type_error(&graph), "i64 payload written to a f32 edge");

        let convert = single_node(
            OpKind::Convert {
                destination: Scalar::F32,
            },
            1,
            &[Scalar::I64],
            Scalar::I64,
        );
        assert_eq!(type_error(&convert), "converts to f32 but writes a i64 edge");
    }

    #[test]
    fn gather_indices_must_be_integer() {
        let graph = single_node(
            OpKind::Gather { batch_dims: 0 },
            8,
            &[Scalar::I64, Scalar::F32, Scalar::I64],
            Scalar::I64,
        );
        assert_eq!(type_error(&graph), "indices must be integer, found f32");
    }

    #[test]
    fn cycle_is_an_integrity_error() {
        let mut graph = OperatorGraph::new();
        let a = edge(&mut graph, "a");
        let b = edge(&mut graph, "b");
        for (id, (i, o)) in [(a, b), (b, a)].into_iter().enumerate() {
            graph.nodes.push(GraphNode {
                id: NodeId(id as u32),
                op: OpKind::Relu,
                version: 1,
                inputs: vec![i],
                outputs: vec![o],
                name: format!("n{id}"),
            });
        }
        assert!(matches!(graph.validate(), Err(IrError::Cycle { .. })));
    }
}
