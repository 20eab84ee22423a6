use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use env_logger::{Env, Target};
use log::info;
use pcb_board::{FootprintLibrary, KicadKernel};
use pcb_edit::CommandRouter;
use pcb_edit::server;

#[derive(Parser)]
#[command(name = "pcb-edit")]
#[command(about = "Edit KiCad boards through JSON commands on stdin", long_about = None)]
#[command(version)]
struct Cli {
    /// Footprint library directory (a `.pretty` folder or a folder of them).
    /// May be repeated; searched before the KiCad defaults.
    #[arg(long = "footprint-lib", value_name = "DIR")]
    footprint_libs: Vec<PathBuf>,

    /// Glob for symbol libraries listed by `list_schematic_libraries`.
    /// May be repeated; replaces the platform defaults.
    #[arg(long = "symbol-lib", value_name = "GLOB")]
    symbol_libs: Vec<String>,

    /// Write logs to this file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut router = start(&cli).inspect_err(|e| println!("{}", server::startup_failure(e)))?;
    server::run_stdio(&mut router)
}

fn start(cli: &Cli) -> Result<CommandRouter> {
    init_logging(cli)?;

    let mut roots = Vec::new();
    for dir in &cli.footprint_libs {
        if !dir.is_dir() {
            bail!("Footprint library not found: {}", dir.display());
        }
        roots.push(dir.clone());
    }
    roots.extend(FootprintLibrary::default_roots());
    let library = FootprintLibrary::new(roots);
    info!(
        "pcb-edit {} ready ({} footprint libraries)",
        env!("CARGO_PKG_VERSION"),
        library.libraries().len()
    );

    Ok(CommandRouter::new(Box::new(KicadKernel::new(library)))
        .with_symbol_patterns(cli.symbol_libs.clone()))
}

/// stdout carries responses, so logs go to stderr or `--log-file`.
fn init_logging(cli: &Cli) -> Result<()> {
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("info")
    };
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    } else {
        builder.target(Target::Stderr);
    }
    builder.init();
    Ok(())
}
