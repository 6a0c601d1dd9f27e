#![no_main]

use libfuzzer_sys::fuzz_target;
use npuc_compiler::{CompilerConfig, CompilerType};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(graph) = npuc_ir::OperatorGraph::from_json(text) else {
        return;
    };
    // Downgrading and emitting IR either succeeds or reports an error.
    for compiler in [CompilerType::Driver, CompilerType::Mlir] {
        let _ = npuc_compiler::compile(graph.clone(), &CompilerConfig::with_compiler(compiler));
    }
});
