use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use llvm2hdl::pipeline::{CompileOptions, EmitTarget, FailurePolicy};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    Vhdl,
    Ir,
    CallGraph,
    BuildInfo,
}

impl From<EmitStage> for EmitTarget {
    fn from(stage: EmitStage) -> Self {
        match stage {
            EmitStage::Vhdl => EmitTarget::Vhdl,
            EmitStage::Ir => EmitTarget::Ir,
            EmitStage::CallGraph => EmitTarget::CallGraph,
            EmitStage::BuildInfo => EmitTarget::BuildInfo,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "llvm2hdl",
    version,
    about = "Translates LLVM IR functions into tag-pipelined VHDL design units"
)]
struct Cli {
    /// Input .ll source files
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output kind
    #[arg(long, value_enum, default_value_t = EmitStage::Vhdl)]
    emit: EmitStage,

    /// Library holding the operator entities
    #[arg(long, default_value = "work")]
    library: String,

    /// Skip functions that cannot be translated instead of stopping
    #[arg(long)]
    keep_going: bool,

    /// Print stage timings and instance statistics
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let options = CompileOptions {
        emit: cli.emit.into(),
        library: Some(cli.library.clone()),
        policy: if cli.keep_going {
            FailurePolicy::SkipFunction
        } else {
            FailurePolicy::Abort
        },
        verbose: cli.verbose,
    };

    if cli.verbose {
        match &cli.output {
            Some(path) => eprintln!("llvm2hdl: output  = {}", path.display()),
            None => eprintln!("llvm2hdl: output  = <stdout>"),
        }
        eprintln!("llvm2hdl: emit    = {:?}", cli.emit);
        eprintln!("llvm2hdl: library = {}", cli.library);
    }

    let mut text = String::new();
    let mut failed = false;

    for path in &cli.sources {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("llvm2hdl: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        };
        let display = path.display().to_string();

        if cli.verbose {
            eprintln!("llvm2hdl: source  = {}", display);
        }

        let result = llvm2hdl::pipeline::compile(&source, &options, |_, diags| {
            for diag in diags {
                eprintln!("{}", diag.render(&display, &source));
            }
        });

        match result {
            Ok(output) => {
                if cli.verbose {
                    for unit in &output.units {
                        let stats: Vec<String> = unit
                            .statistics
                            .iter()
                            .map(|(op, n)| format!("{op}={n}"))
                            .collect();
                        eprintln!(
                            "llvm2hdl: @{} -> entity {}: {} stage(s) [{}]",
                            unit.function,
                            unit.entity,
                            unit.stages,
                            stats.join(", ")
                        );
                    }
                }
                failed |= output.has_errors();
                if !text.is_empty() && !output.text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&output.text);
            }
            Err(e) => {
                eprintln!("llvm2hdl: {}: {}", display, e);
                std::process::exit(1);
            }
        }
    }

    let written = match &cli.output {
        Some(path) => std::fs::write(path, &text),
        None => std::io::stdout().write_all(text.as_bytes()),
    };
    if let Err(e) = written {
        eprintln!("llvm2hdl: error: cannot write output: {}", e);
        std::process::exit(2);
    }

    if failed {
        std::process::exit(1);
    }
}
