use ndarray::{ArrayD, IxDyn};
use npuc_compiler::{CompilerConfig, CompilerType};
#[allow(unused_imports)]
use npuc_ir::{
    ConstantData, EdgeId, InterpolateAttrs, OpKind, OperatorGraph, Scalar, ShapeCalcMode,
    TensorInfo, TensorShape,
};

/// The single device the behavior suite runs against.
#[allow(dead_code)]
pub const DEVICE_NPU: &str = npuc_compiler::DEVICE_NPU;

/// Configurations the behavior suite is instantiated with.
#[allow(dead_code)]
pub fn driver_configs() -> Vec<CompilerConfig> {
    vec![CompilerConfig::with_compiler(CompilerType::Driver)]
}

/// Readable name for a `(device, config)` test case.
#[allow(dead_code)]
pub fn test_case_name(device: &str, config: &CompilerConfig) -> String {
    let mut name = format!("targetDevice={device}");
    for (key, value) in config.entries() {
        name.push_str(&format!("_configItem={key}_{value}"));
    }
    name
}

/// The second Interpolate-11 input.
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub enum Resize {
    Scales(Vec<f32>),
    Sizes(Vec<i64>),
}

/// Output extents of an Interpolate-11 node, for labelling the output edge.
fn resized_shape(
    input: &[u32],
    attrs: &InterpolateAttrs,
    resize: &Resize,
    axes: &[usize],
) -> Vec<u32> {
    let mut out: Vec<u32> = input
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            d + attrs.pads_begin.get(i).copied().unwrap_or(0) as u32
                + attrs.pads_end.get(i).copied().unwrap_or(0) as u32
        })
        .collect();
    for (i, &axis) in axes.iter().enumerate() {
        out[axis] = match resize {
            Resize::Scales(s) => (out[axis] as f32 * s[i] + 1.0e-5).floor() as u32,
            Resize::Sizes(s) => s[i] as u32,
        };
    }
    out
}

/// A graph holding a single Interpolate-11 node fed by constants.
///
/// `axes` of `None` builds the two-input form, where `resize` covers every
/// dimension.
#[allow(dead_code)]
pub fn interpolate11_graph(
    input_shape: &[u32],
    mut attrs: InterpolateAttrs,
    resize: Resize,
    axes: Option<Vec<i64>>,
) -> OperatorGraph {
    attrs.shape_calculation_mode = match resize {
        Resize::Scales(_) => ShapeCalcMode::Scales,
        Resize::Sizes(_) => ShapeCalcMode::Sizes,
    };
    let rank = input_shape.len();
    let axis_list: Vec<usize> = match &axes {
        Some(a) => a
            .iter()
            .map(|&x| if x < 0 { (x + rank as i64) as usize } else { x as usize })
            .collect(),
        None => (0..rank).collect(),
    };
    let out_shape = resized_shape(input_shape, &attrs, &resize, &axis_list);

    let mut graph = OperatorGraph::new();
    let x = graph.add_edge(TensorInfo::new(
        "data",
        Scalar::F32,
        TensorShape::fixed(input_shape),
    ));
    let (scalar, payload) = match resize {
        Resize::Scales(s) => (Scalar::F32, ConstantData::F32(s)),
        Resize::Sizes(s) => (Scalar::I64, ConstantData::I64(s)),
    };
    let param = graph.add_edge(TensorInfo::new(
        "scales_or_sizes",
        scalar,
        TensorShape::fixed(&[payload.len() as u32]),
    ));
    let y = graph.add_edge(TensorInfo::new(
        "resized",
        Scalar::F32,
        TensorShape::fixed(&out_shape),
    ));
    graph.inputs = vec![x];
    graph.outputs = vec![y];

    graph
        .add_node(OpKind::Constant(payload), 1, vec![], vec![param], "scales_or_sizes")
        .expect("constant");
    let mut inputs = vec![x, param];
    if let Some(axes) = axes {
        let axes_edge = graph.add_edge(TensorInfo::new(
            "axes",
            Scalar::I64,
            TensorShape::fixed(&[axes.len() as u32]),
        ));
        graph
            .add_node(
                OpKind::Constant(ConstantData::I64(axes)),
                1,
                vec![],
                vec![axes_edge],
                "axes",
            )
            .expect("axes constant");
        inputs.push(axes_edge);
    }
    graph
        .add_node(OpKind::Interpolate(attrs), 11, inputs, vec![y], "interpolate")
        .expect("interpolate");
    graph
}

/// 1x3x4x4 Interpolate-11 over axes `[2, 3]` whose second input is a graph
/// input of element type `param`, so any scalar type can be fed.
#[allow(dead_code)]
pub fn interpolate11_fed(mode: ShapeCalcMode, param: Scalar) -> OperatorGraph {
    let mut graph = OperatorGraph::new();
    let x = graph.add_edge(TensorInfo::new(
        "data",
        Scalar::F32,
        TensorShape::fixed(&[1, 3, 4, 4]),
    ));
    let p = graph.add_edge(TensorInfo::new(
        "scales_or_sizes",
        param,
        TensorShape::fixed(&[2]),
    ));
    let axes = graph.add_edge(TensorInfo::new("axes", Scalar::I64, TensorShape::fixed(&[2])));
    let y = graph.add_edge(TensorInfo::new(
        "resized",
        Scalar::F32,
        TensorShape::fixed(&[1, 3, 8, 8]),
    ));
    graph.inputs = vec![x, p];
    graph.outputs = vec![y];
    graph
        .add_node(
            OpKind::Constant(ConstantData::I64(vec![2, 3])),
            1,
            vec![],
            vec![axes],
            "axes",
        )
        .expect("axes constant");
    let attrs = InterpolateAttrs {
        shape_calculation_mode: mode,
        ..Default::default()
    };
    graph
        .add_node(OpKind::Interpolate(attrs), 11, vec![x, p, axes], vec![y], "interpolate")
        .expect("interpolate");
    graph
}

/// Element types of the inputs of the first `op_type` node.
#[allow(dead_code)]
pub fn input_scalars(graph: &OperatorGraph, op_type: &str) -> Vec<Scalar> {
    let node = graph
        .nodes
        .iter()
        .find(|n| n.op_type() == op_type)
        .unwrap_or_else(|| panic!("no {op_type} node"));
    node.inputs
        .iter()
        .map(|&e| graph.edge(e).expect("registered edge").scalar)
        .collect()
}

/// Driver configuration reporting `opset` as its newest supported opset.
#[allow(dead_code)]
pub fn driver_at_opset(opset: u32) -> CompilerConfig {
    CompilerConfig::from_options(&[format!("NPU_DRIVER_OPSET={opset}")]).expect("driver opset")
}

/// The canonical scenario: 1x3x4x4 upscaled 2x on the spatial axes.
#[allow(dead_code)]
pub fn simple_interpolate11() -> OperatorGraph {
    interpolate11_graph(
        &[1, 3, 4, 4],
        InterpolateAttrs::default(),
        Resize::Scales(vec![2.0, 2.0]),
        Some(vec![2, 3]),
    )
}

/// `data -> op -> out`, one node of the given type and version.
#[allow(dead_code)]
pub fn single_op_graph(op: OpKind, version: u32) -> OperatorGraph {
    let mut graph = OperatorGraph::new();
    let x = graph.add_edge(TensorInfo::new("x", Scalar::F32, TensorShape::fixed(&[1, 8])));
    let y = graph.add_edge(TensorInfo::new("y", Scalar::F32, TensorShape::fixed(&[1, 8])));
    graph.inputs = vec![x];
    graph.outputs = vec![y];
    graph
        .add_node(op, version, vec![x], vec![y], "op")
        .expect("node");
    graph
}

/// Deterministic, non-trivial input data.
#[allow(dead_code)]
pub fn sample_input(shape: &[u32]) -> ArrayD<f32> {
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    let mut i = 0usize;
    ArrayD::from_shape_simple_fn(IxDyn(&dims), || {
        i += 1;
        ((i * 37) % 101) as f32 / 10.0 - 3.0
    })
}

/// The graph's only input edge.
#[allow(dead_code)]
pub fn only_input(graph: &OperatorGraph) -> EdgeId {
    assert_eq!(graph.inputs.len(), 1, "expected a single graph input");
    graph.inputs[0]
}

/// Load a demo graph by name (without extension).
#[allow(dead_code)]
pub fn load_demo(name: &str) -> OperatorGraph {
    let path = format!("{}/../../demos/{name}.json", env!("CARGO_MANIFEST_DIR"));
    let text =
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to load {path}: {e}"));
    OperatorGraph::from_json(&text).unwrap_or_else(|e| panic!("failed to parse {path}: {e}"))
}
