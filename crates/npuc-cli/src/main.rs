use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use npuc_compiler::{CompilerAdapter, CompilerConfig, DEVICE_NPU};
use npuc_ir::OperatorGraph;

/// npuc: compile operator graphs for NPU targets
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input graph (JSON)
    input: PathBuf,

    /// Target device: NPU or NPU.<platform>
    #[arg(short, long, default_value = DEVICE_NPU)]
    device: String,

    /// Compiler option as KEY=VALUE (repeatable), e.g. NPU_COMPILER_TYPE=DRIVER
    #[arg(short, long = "config", value_name = "KEY=VALUE")]
    config: Vec<String>,

    /// Output path for the IR XML; weights go next to it as `.bin`
    /// (default: XML to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the compiled graph to stderr
    #[arg(long)]
    emit_ir: bool,

    /// Compile without writing output
    #[arg(long)]
    dry_run: bool,

    /// Increase log verbosity (overrides LOG_LEVEL)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &CompilerConfig) {
    let level = match verbose {
        0 => config.log_level().to_level_filter(),
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn write_file(path: &Path, data: &[u8]) -> miette::Result<()> {
    std::fs::write(path, data)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to write {}", path.display()))
}

/// Where the weights for the IR at `xml` are written.
fn weights_path(xml: &Path) -> miette::Result<PathBuf> {
    let weights = xml.with_extension("bin");
    if weights == xml {
        return Err(miette::miette!(
            "output path {} would be overwritten by the weights; use a .xml extension",
            xml.display()
        ));
    }
    Ok(weights)
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Configuration.
    let config = CompilerConfig::from_options(&cli.config)
        .into_diagnostic()
        .wrap_err("invalid compiler configuration")?;
    init_logging(cli.verbose, &config);

    // 2. Read the graph.
    let text = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;
    let graph = OperatorGraph::from_json(&text)
        .into_diagnostic()
        .wrap_err("failed to parse graph")?;

    // 3. Compile.
    let adapter = CompilerAdapter::for_device(&cli.device, config)
        .into_diagnostic()
        .wrap_err("failed to set up compiler")?;
    let artifact = adapter
        .compile(graph)
        .into_diagnostic()
        .wrap_err("compilation failed")?;

    // 4. Report.
    eprintln!("{}", artifact.metadata);
    for record in &artifact.metadata.downgrades {
        eprintln!("  downgraded {record}");
    }
    if cli.emit_ir {
        eprintln!("{}", npuc_ir::dump_graph(&artifact.graph));
    }

    // 5. Dry-run: stop here.
    if cli.dry_run {
        return Ok(());
    }

    // 6. Write output.
    match &cli.output {
        Some(path) if artifact.blob.weights.is_empty() => {
            write_file(path, artifact.blob.xml.as_bytes())?;
        }
        Some(path) => {
            let weights = weights_path(path)?;
            write_file(path, artifact.blob.xml.as_bytes())?;
            write_file(&weights, &artifact.blob.weights)?;
        }
        None if artifact.blob.weights.is_empty() => print!("{}", artifact.blob.xml),
        None => {
            return Err(miette::miette!(
                "graph has constant weights but no --output path was specified"
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sit_next_to_the_xml() {
        let path = weights_path(Path::new("out/model.xml")).unwrap();
        assert_eq!(path, Path::new("out/model.bin"));
        assert_eq!(weights_path(Path::new("model")).unwrap(), Path::new("model.bin"));
    }

    #[test]
    fn bin_output_path_is_rejected() {
        assert!(weights_path(Path::new("model.bin")).is_err());
    }
}
