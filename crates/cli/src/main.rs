//! Cache simulator CLI.
//!
//! This binary drives the cache model from JSON files. It performs:
//! 1. **Trace run:** Builds a cache from a configuration, replays a trace and prints
//!    the statistics report (or the full report as JSON).
//! 2. **Config dump:** Prints the default configuration as a starting point.
//!
//! Logging goes to stderr and is filtered with `RUST_LOG` (default `warn`).

use std::process;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use cachesim_core::config::CacheConfig;
use cachesim_core::sim::{Simulator, Trace};
use cachesim_core::stats::STATS_SECTIONS;

#[derive(Parser, Debug)]
#[command(
    name = "cachesim",
    author,
    version,
    about = "Cycle-level memory-side cache simulator",
    long_about = "Replay an access trace against a configurable cache and report hit/miss counts and stall statistics.\n\nExamples:\n  cachesim config > cache.json\n  cachesim run --config cache.json --trace trace.json\n  cachesim run --trace trace.json --json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a trace and print the report.
    Run {
        /// Cache configuration (JSON). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<String>,

        /// Trace to replay (JSON).
        #[arg(short, long)]
        trace: String,

        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Report sections to print (summary, stalls, backend, accesses). All when empty.
        #[arg(long, value_delimiter = ',')]
        sections: Vec<String>,

        /// Per-request tick budget before the run is aborted.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the default configuration as JSON.
    Config,
}

fn main() {
    fmt::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            trace,
            json,
            sections,
            timeout,
        } => cmd_run(config.as_deref(), &trace, json, &sections, timeout),
        Commands::Config => cmd_config(),
    }
}

/// Loads the configuration and trace, replays it and prints the report.
///
/// Exits the process with code 1 on any load, configuration or timeout error.
fn cmd_run(
    config_path: Option<&str>,
    trace_path: &str,
    json: bool,
    sections: &[String],
    timeout: Option<u64>,
) {
    if let Some(bad) = unknown_section(sections) {
        fatal(
            "--sections",
            &format!("unknown section `{bad}` (expected one of {})", STATS_SECTIONS.join(", ")),
        );
    }
    let config = match config_path {
        Some(path) => CacheConfig::from_file(path).unwrap_or_else(|e| fatal(path, &e)),
        None => CacheConfig::default(),
    };
    let trace = Trace::from_file(trace_path).unwrap_or_else(|e| fatal(trace_path, &e));

    let mut sim = Simulator::from_config(&config).unwrap_or_else(|e| fatal("config", &e));
    if let Some(ticks) = timeout {
        sim = sim.with_timeout(ticks);
    }
    info!(
        ways = config.ways(),
        sets = config.sets(),
        ops = trace.ops.len(),
        "replaying trace"
    );

    let report = sim.run_trace(&trace).unwrap_or_else(|e| fatal(trace_path, &e));
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => fatal("report", &e),
        }
    } else {
        report.stats.print_sections(&report.counters, sections);
    }
}

/// Prints `CacheConfig::default()` as pretty JSON.
fn cmd_config() {
    match serde_json::to_string_pretty(&CacheConfig::default()) {
        Ok(text) => println!("{text}"),
        Err(e) => fatal("config", &e),
    }
}

/// First requested report section that the statistics report does not have.
fn unknown_section(sections: &[String]) -> Option<&str> {
    sections
        .iter()
        .map(String::as_str)
        .find(|s| !STATS_SECTIONS.contains(s))
}

fn fatal(what: &str, err: &dyn std::fmt::Display) -> ! {
    eprintln!("[!] FATAL: {what}: {err}");
    process::exit(1);
}
