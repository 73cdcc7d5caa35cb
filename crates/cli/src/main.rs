//! DRAM subsystem simulator CLI.
//!
//! This binary provides the command-line entry point. It performs:
//! 1. **Run:** Load a JSON configuration (or defaults), play a trace through
//!    the memory system, print the statistics report.
//! 2. **List-params:** Print every component's advertised tunables.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use dram_core::config::{ControllerConfig, EccConfig, FrontendConfig, PracConfig, SimConfig};
use dram_core::sim::Simulation;

#[derive(Parser, Debug)]
#[command(
    name = "dramsim",
    author,
    version,
    about = "Cycle-accurate DRAM subsystem simulator",
    long_about = "Play a memory trace through a cycle-accurate DRAM controller and device model.\n\nConfiguration is JSON (see list-params for tunables); the CLI falls back to built-in defaults.\n\nExamples:\n  dramsim run -c configs/ddr.json\n  dramsim run --trace traces/qsort.trace\n  dramsim run -c configs/ddr.json --stats-json out.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a trace to completion and print statistics.
    Run {
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Trace file, overriding the configured path.
        #[arg(long)]
        trace: Option<String>,

        /// Also write the statistics report as JSON.
        #[arg(long)]
        stats_json: Option<PathBuf>,
    },

    /// Print every component's tunable parameters.
    ListParams,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            trace,
            stats_json,
        } => cmd_run(config, trace, stats_json),
        Commands::ListParams => cmd_list_params(),
    }
}

/// Builds the simulation, runs it, and prints the report. Configuration
/// errors abort with exit code 1.
fn cmd_run(config: Option<PathBuf>, trace: Option<String>, stats_json: Option<PathBuf>) {
    let mut cfg = match config {
        Some(path) => match SimConfig::from_json_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => SimConfig::default(),
    };
    if let Some(trace_path) = trace {
        cfg.frontend.path = trace_path;
    }

    let mut sim = match Simulation::from_config(&cfg) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let report = sim.run();
    report.print();

    if let Some(path) = stats_json {
        let json = serde_json::to_string_pretty(&report.to_json()).expect("report serializes");
        if let Err(e) = std::fs::write(&path, json) {
            eprintln!("Error: cannot write {}: {}", path.display(), e);
            process::exit(1);
        }
        println!("\nStats written to {}", path.display());
    }
}

/// Prints the tunable-parameter catalog.
fn cmd_list_params() {
    let sections = [
        ("frontend", FrontendConfig::params()),
        ("memory.controller", ControllerConfig::params()),
        ("plugins.Ecc", EccConfig::params()),
        ("plugins.Prac", PracConfig::params()),
    ];
    for (component, params) in sections {
        println!("[{}]", component);
        for p in params {
            let requirement = if p.required {
                "required".to_string()
            } else {
                format!("default: {}", p.default)
            };
            println!("  {:<24} {} ({})", p.name, p.desc, requirement);
        }
        println!();
    }
}
