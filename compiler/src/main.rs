//! `cntrcc`: thin command-line driver for [`contractc`].
//!
//! Per spec.md §1, lexing/parsing source text into an `ast::Module` is an
//! external collaborator's job; this binary's input is already-parsed JSON
//! (see `ast.rs`'s `Deserialize` derives). It owns only driving
//! [`contractc::compile_module`] and rendering results to the filesystem or
//! terminal, the same division the teacher's CLI drew between itself and
//! `seqc`'s library crate.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser as ClapParser, Subcommand};

use contractc::{ast, CompilerConfig, ImportedSignatures};

#[derive(ClapParser)]
#[command(name = "cntrcc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile a contract module's AST to bytecode for the target VM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON-encoded module to bytecode and ABI/layout artifacts.
    Compile {
        /// Path to a JSON-serialized `ast::Module`.
        input: PathBuf,

        /// Directory to write artifacts into (deploy.hex, runtime.hex,
        /// abi.json, layout.json, source_map.json). Defaults to the
        /// input file's directory.
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Maximum register stack depth before the scheduler's spill ceiling
        /// is treated as exceeded (spec.md §9).
        #[arg(long, default_value_t = 1024)]
        max_stack_depth: u32,
    },

    /// Run the structural lints and stack-depth projection without
    /// generating bytecode.
    Lint {
        /// Path to a JSON-serialized `ast::Module`.
        input: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Compile { input, out_dir, max_stack_depth } => run_compile(input, out_dir, max_stack_depth),
        Commands::Lint { input } => run_lint(input),
    };

    if let Err(message) = result {
        eprintln!("{message}");
        process::exit(1);
    }
}

fn load_module(path: &PathBuf) -> Result<ast::Module, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("failed to parse module JSON: {e}"))
}

fn run_compile(input: PathBuf, out_dir: Option<PathBuf>, max_stack_depth: u32) -> Result<(), String> {
    let module = load_module(&input)?;
    let mut config = CompilerConfig::default();
    config.max_stack_depth = max_stack_depth;
    let imported = Arc::new(ImportedSignatures::default());

    let artifacts = contractc::compile_module(&module, &imported, &config).map_err(|diagnostics| {
        diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("\n")
    })?;

    for warning in &artifacts.warnings {
        eprintln!("{warning}");
    }

    let out_dir = out_dir.unwrap_or_else(|| input.parent().map(|p| p.to_path_buf()).unwrap_or_default());
    fs::create_dir_all(&out_dir).map_err(|e| format!("failed to create {}: {e}", out_dir.display()))?;

    fs::write(out_dir.join("deploy.hex"), hex_encode(&artifacts.deploy_bytecode))
        .map_err(|e| format!("failed to write deploy.hex: {e}"))?;
    fs::write(out_dir.join("runtime.hex"), hex_encode(&artifacts.runtime_bytecode))
        .map_err(|e| format!("failed to write runtime.hex: {e}"))?;
    fs::write(
        out_dir.join("abi.json"),
        serde_json::to_string_pretty(&artifacts.abi).map_err(|e| format!("failed to encode abi.json: {e}"))?,
    )
    .map_err(|e| format!("failed to write abi.json: {e}"))?;
    fs::write(
        out_dir.join("layout.json"),
        serde_json::to_string_pretty(&artifacts.storage_layout)
            .map_err(|e| format!("failed to encode layout.json: {e}"))?,
    )
    .map_err(|e| format!("failed to write layout.json: {e}"))?;
    fs::write(
        out_dir.join("source_map.json"),
        serde_json::to_string_pretty(&artifacts.source_map)
            .map_err(|e| format!("failed to encode source_map.json: {e}"))?,
    )
    .map_err(|e| format!("failed to write source_map.json: {e}"))?;

    println!("wrote artifacts to {}", out_dir.display());
    Ok(())
}

fn run_lint(input: PathBuf) -> Result<(), String> {
    let module = load_module(&input)?;
    let config = CompilerConfig::default();

    let mut diagnostics = contractc::lint::lint_module(&module, &contractc::lint::LintConfig::default());
    diagnostics.extend(contractc::resource_lint::project_stack_depth(&module, &config));

    if diagnostics.is_empty() {
        println!("no lints raised");
        return Ok(());
    }
    for d in diagnostics {
        println!("{d}");
    }
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
