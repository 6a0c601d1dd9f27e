#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Loading and validating a graph should never panic on any input.
        if let Ok(graph) = npuc_ir::OperatorGraph::from_json(text) {
            let _ = graph.validate();
            let _ = npuc_ir::dump_graph(&graph);
        }
    }
});
