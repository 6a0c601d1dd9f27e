//! Text dump for debugging and determinism checks.

use std::fmt::Write;

use crate::graph::{EdgeId, GraphNode, OperatorGraph};
use crate::op::OpKind;

/// Dump a graph as human-readable text.
///
/// The output depends only on graph contents, never on hash order, so two
/// structurally identical graphs dump to identical bytes.
pub fn dump_graph(graph: &OperatorGraph) -> String {
    let mut out = String::new();

    out.push_str("Edges:\n");
    for (id, info) in &graph.edges {
        let _ = writeln!(out, "  {id}: {} {}{}", info.name, info.scalar, info.shape);
    }

    let _ = writeln!(out, "Inputs: {}", edge_list(&graph.inputs));
    out.push_str("Nodes:\n");
    for node in &graph.nodes {
        let _ = writeln!(out, "  {}", format_node(node));
    }
    let _ = writeln!(out, "Outputs: {}", edge_list(&graph.outputs));

    out
}

/// One-line description of a node: `#id Type-vN(in) -> (out) "name" {attrs}`.
pub fn format_node(node: &GraphNode) -> String {
    let mut s = format!(
        "{} {}-v{}({}) -> ({}) \"{}\"",
        node.id,
        node.op_type(),
        node.version,
        edge_list(&node.inputs),
        edge_list(&node.outputs),
        node.name
    );
    let attrs = format_attrs(&node.op);
    if !attrs.is_empty() {
        let _ = write!(s, " {{{attrs}}}");
    }
    s
}

fn format_attrs(op: &OpKind) -> String {
    match op {
        OpKind::Constant(data) => format!("{}x{}", data.scalar(), data.len()),
        OpKind::Gather { batch_dims } => format!("batch_dims={batch_dims}"),
        OpKind::Convert { destination } => format!("destination={destination}"),
        OpKind::Interpolate(a) => format!(
            "mode={}, shape_calc={}, coord={}, nearest={}, antialias={}, cube_coeff={}",
            a.mode,
            a.shape_calculation_mode,
            a.coordinate_transformation_mode,
            a.nearest_mode,
            a.antialias,
            a.cube_coeff
        ),
        _ => String::new(),
    }
}

fn edge_list(edges: &[EdgeId]) -> String {
    edges
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
