//! Entry-point generator driver
//!
//! Reads a JSON description of a type-checked source file, emits its
//! program entry point and prints the resulting IR module.

use clap::Parser;
use egen_common::{CompilerError, ErrorReporter};
use egen_ir::{verify_module, Module};
use egen_lower::{BasicLowering, EmitOptions, EntryDescriptor, EntryPointEmitter, SourceFile};
use log::info;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "egen")]
#[command(about = "Emit the program entry point for a source file")]
#[command(version = "0.1.0")]
struct Cli {
    /// Source file description (JSON)
    input: PathBuf,

    /// Output file for the module; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run top-level code on the main executor and leave through `exit`
    #[arg(long = "async")]
    async_entry: bool,

    /// Count executions of each top-level code block
    #[arg(long)]
    profile: bool,

    /// Write the module as JSON instead of text
    #[arg(long)]
    emit_json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::init();
    }

    let mut reporter = ErrorReporter::new();
    let result = run(&cli, &mut reporter);
    reporter.print_diagnostics();
    if reporter.error_count() > 0 || reporter.warning_count() > 0 {
        eprintln!("{}", reporter.summary());
    }
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, reporter: &mut ErrorReporter) -> Result<(), CompilerError> {
    let source = fs::read_to_string(&cli.input)?;
    let module_name = cli
        .input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("main");

    let descriptor = if cli.async_entry {
        EntryDescriptor::asynchronous()
    } else {
        EntryDescriptor::synchronous()
    };
    let options = EmitOptions { profile: cli.profile };
    let module = compile(&source, module_name, &descriptor, options, reporter)?;

    let text = if cli.emit_json {
        serde_json::to_string_pretty(&module)
            .map_err(|e| CompilerError::internal(format!("cannot serialize module: {}", e)))?
    } else {
        module.to_string()
    };
    match &cli.output {
        Some(path) => {
            fs::write(path, text)?;
            info!("Module written to: {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

/// Parse a source file description and emit its entry point into a new module
fn compile(
    source: &str,
    module_name: &str,
    descriptor: &EntryDescriptor,
    options: EmitOptions,
    reporter: &mut ErrorReporter,
) -> Result<Module, CompilerError> {
    let file: SourceFile = serde_json::from_str(source).map_err(|e| CompilerError::InvalidInput {
        message: e.to_string(),
    })?;
    info!("Loaded '{}' with {} top-level declarations", file.name, file.top_level_decls.len());

    let mut module = Module::new(module_name.to_string());
    let mut lowering = BasicLowering::new();
    EntryPointEmitter::new(&mut module, reporter, options).emit_entry_point(&file, descriptor, &mut lowering)?;
    verify_module(&module)?;
    Ok(module)
}
