//! OpenVINO IR v11 XML emitter.
//!
//! Generates the network description (`model.xml`) and the packed constant
//! payload (`model.bin`) from an operator graph.

use std::collections::HashMap;
use std::fmt::Write;

use npuc_ir::{ConstantData, Dimension, EdgeId, GraphNode, OpKind, OperatorGraph, Scalar, TensorInfo};

use crate::CompileError;

/// Serialized network: XML description plus constant weights.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IrBlob {
    pub xml: String,
    pub weights: Vec<u8>,
}

impl IrBlob {
    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.xml.len() + self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A layer in the OpenVINO IR graph.
struct IrLayer {
    id: usize,
    name: String,
    layer_type: String,
    /// `opsetN`, empty for layers without a version.
    version: String,
    /// Layer-specific attributes as `<data key="value" .../>`.
    data_attrs: Vec<(&'static str, String)>,
    /// Input ports: (port_id, edge).
    input_ports: Vec<(usize, EdgeId)>,
    /// Output ports: (port_id, edge).
    output_ports: Vec<(usize, EdgeId)>,
}

/// An edge connecting two layers.
struct IrEdge {
    from_layer: usize,
    from_port: usize,
    to_layer: usize,
    to_port: usize,
}

/// Build OpenVINO IR from `graph`, tagging the network with `rt_info`
/// key/value pairs.
pub fn build_ir(
    graph: &OperatorGraph,
    model_name: &str,
    rt_info: &[(&str, String)],
) -> Result<IrBlob, CompileError> {
    let mut layers = Vec::new();
    let mut weights = Vec::new();
    let mut layer_id = 0;
    // Edge -> (producing layer, output port).
    let mut producers: HashMap<EdgeId, (usize, usize)> = HashMap::new();

    for &edge in &graph.inputs {
        let info = edge_info(graph, edge)?;
        let id = next_id(&mut layer_id);
        producers.insert(edge, (id, 0));
        layers.push(IrLayer {
            id,
            name: info.name.clone(),
            layer_type: "Parameter".into(),
            version: "opset1".into(),
            data_attrs: vec![
                ("shape", shape_attr(info)),
                ("element_type", info.scalar.to_string()),
            ],
            input_ports: vec![],
            output_ports: vec![(0, edge)],
        });
    }

    for node in graph.topological_order()? {
        let id = next_id(&mut layer_id);
        let inputs = node.inputs.len();
        for (i, &edge) in node.outputs.iter().enumerate() {
            producers.insert(edge, (id, inputs + i));
        }
        layers.push(IrLayer {
            id,
            name: node.name.clone(),
            layer_type: node.op_type().to_string(),
            version: match node.op {
                OpKind::Custom { .. } => "extension".into(),
                _ => format!("opset{}", node.version),
            },
            data_attrs: data_attrs(graph, node, &mut weights)?,
            input_ports: node.inputs.iter().copied().enumerate().collect(),
            output_ports: node
                .outputs
                .iter()
                .enumerate()
                .map(|(i, &e)| (inputs + i, e))
                .collect(),
        });
    }

    for &edge in &graph.outputs {
        let info = edge_info(graph, edge)?;
        let id = next_id(&mut layer_id);
        layers.push(IrLayer {
            id,
            name: format!("{}/sink_port_0", info.name),
            layer_type: "Result".into(),
            version: "opset1".into(),
            data_attrs: vec![],
            input_ports: vec![(0, edge)],
            output_ports: vec![],
        });
    }

    let mut edges = Vec::new();
    for layer in &layers {
        for &(port, edge) in &layer.input_ports {
            let &(from_layer, from_port) = producers.get(&edge).ok_or_else(|| {
                CompileError::Backend(format!("layer '{}' reads unproduced edge {edge}", layer.name))
            })?;
            edges.push(IrEdge {
                from_layer,
                from_port,
                to_layer: layer.id,
                to_port: port,
            });
        }
    }

    let xml = format_ir_xml(graph, &layers, &edges, model_name, rt_info)?;
    Ok(IrBlob { xml, weights })
}

fn edge_info(graph: &OperatorGraph, edge: EdgeId) -> Result<&TensorInfo, CompileError> {
    graph
        .edge(edge)
        .ok_or_else(|| CompileError::Backend(format!("unknown edge {edge}")))
}

fn next_id(id: &mut usize) -> usize {
    let current = *id;
    *id += 1;
    current
}

fn shape_attr(info: &TensorInfo) -> String {
    info.shape
        .dims
        .iter()
        .map(dim_text)
        .collect::<Vec<_>>()
        .join(",")
}

fn dim_text(dim: &Dimension) -> String {
    match dim {
        Dimension::Fixed(n) => n.to_string(),
        Dimension::Dynamic(_) => "-1".into(),
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// OpenVINO port precision name.
fn precision(scalar: Scalar) -> &'static str {
    match scalar {
        Scalar::F32 => "FP32",
        Scalar::F16 => "FP16",
        Scalar::I64 => "I64",
        Scalar::I32 => "I32",
        Scalar::U8 => "U8",
        Scalar::BOOL => "BOOL",
        _ => "UNSPECIFIED",
    }
}

fn data_attrs(
    graph: &OperatorGraph,
    node: &GraphNode,
    weights: &mut Vec<u8>,
) -> Result<Vec<(&'static str, String)>, CompileError> {
    Ok(match &node.op {
        OpKind::Constant(data) => {
            let offset = weights.len();
            match data {
                ConstantData::F32(v) => v.iter().for_each(|x| weights.extend(x.to_le_bytes())),
                ConstantData::I64(v) => v.iter().for_each(|x| weights.extend(x.to_le_bytes())),
            }
            let shape = match node.outputs.first() {
                Some(&e) => shape_attr(edge_info(graph, e)?),
                None => data.len().to_string(),
            };
            vec![
                ("element_type", data.scalar().to_string()),
                ("shape", shape),
                ("offset", offset.to_string()),
                ("size", (weights.len() - offset).to_string()),
            ]
        }
        OpKind::ShapeOf if node.version >= 3 => vec![("output_type", Scalar::I64.to_string())],
        OpKind::Gather { batch_dims } if node.version >= 7 => {
            vec![("batch_dims", batch_dims.to_string())]
        }
        OpKind::ShapeOf | OpKind::Gather { .. } => vec![],
        OpKind::Convert { destination } => vec![("destination_type", destination.to_string())],
        OpKind::Add | OpKind::Multiply | OpKind::Divide | OpKind::FloorMod => {
            let mut attrs = vec![("auto_broadcast", "numpy".to_string())];
            if matches!(node.op, OpKind::Divide) {
                attrs.push(("m_pythondiv", "true".into()));
            }
            attrs
        }
        OpKind::Interpolate(a) => vec![
            ("mode", a.mode.to_string()),
            ("shape_calculation_mode", a.shape_calculation_mode.to_string()),
            (
                "coordinate_transformation_mode",
                a.coordinate_transformation_mode.to_string(),
            ),
            ("nearest_mode", a.nearest_mode.to_string()),
            ("antialias", a.antialias.to_string()),
            ("pads_begin", join(&a.pads_begin)),
            ("pads_end", join(&a.pads_end)),
            ("cube_coeff", a.cube_coeff.to_string()),
        ],
        OpKind::Floor | OpKind::Relu | OpKind::Custom { .. } => vec![],
    })
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_port(
    xml: &mut String,
    graph: &OperatorGraph,
    port: usize,
    edge: EdgeId,
) -> Result<(), CompileError> {
    let info = edge_info(graph, edge)?;
    let _ = writeln!(
        xml,
        "        <port id=\"{port}\" precision=\"{}\" names=\"{}\">",
        precision(info.scalar),
        escape(&info.name)
    );
    for dim in &info.shape.dims {
        let _ = writeln!(xml, "          <dim>{}</dim>", dim_text(dim));
    }
    xml.push_str("        </port>\n");
    Ok(())
}

/// Format layers and edges into OpenVINO IR v11 XML.
fn format_ir_xml(
    graph: &OperatorGraph,
    layers: &[IrLayer],
    edges: &[IrEdge],
    model_name: &str,
    rt_info: &[(&str, String)],
) -> Result<String, CompileError> {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\"?>\n");
    let _ = writeln!(xml, "<net name=\"{}\" version=\"11\">", escape(model_name));
    xml.push_str("  <layers>\n");

    for layer in layers {
        let _ = writeln!(
            xml,
            "    <layer id=\"{}\" name=\"{}\" type=\"{}\" version=\"{}\">",
            layer.id,
            escape(&layer.name),
            escape(&layer.layer_type),
            layer.version
        );

        if !layer.data_attrs.is_empty() {
            xml.push_str("      <data");
            for (key, value) in &layer.data_attrs {
                let _ = write!(xml, " {key}=\"{}\"", escape(value));
            }
            xml.push_str("/>\n");
        }

        if !layer.input_ports.is_empty() {
            xml.push_str("      <input>\n");
            for &(port, edge) in &layer.input_ports {
                write_port(&mut xml, graph, port, edge)?;
            }
            xml.push_str("      </input>\n");
        }

        if !layer.output_ports.is_empty() {
            xml.push_str("      <output>\n");
            for &(port, edge) in &layer.output_ports {
                write_port(&mut xml, graph, port, edge)?;
            }
            xml.push_str("      </output>\n");
        }

        xml.push_str("    </layer>\n");
    }

    xml.push_str("  </layers>\n");
    xml.push_str("  <edges>\n");
    for edge in edges {
        let _ = writeln!(
            xml,
            "    <edge from-layer=\"{}\" from-port=\"{}\" to-layer=\"{}\" to-port=\"{}\"/>",
            edge.from_layer, edge.from_port, edge.to_layer, edge.to_port
        );
    }
    xml.push_str("  </edges>\n");

    if !rt_info.is_empty() {
        xml.push_str("  <rt_info>\n");
        for (key, value) in rt_info {
            let _ = writeln!(xml, "    <{key} value=\"{}\"/>", escape(value));
        }
        xml.push_str("  </rt_info>\n");
    }

    xml.push_str("</net>\n");
    Ok(xml)
}
