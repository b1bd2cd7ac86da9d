//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use trc::BlockRef;

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "trc")]
#[command(about = "Resolve tracers and replay recorded calls through them")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    /// Extra directory of tracer scripts (*.js) registered at startup
    #[arg(long, global = true, value_name = "DIR")]
    pub scripts: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered collectors
    List,
    /// Print the source of a script collector
    Show {
        /// Collector name
        name: String,
    },
    /// Replay a recorded call batch through a tracer
    Trace {
        /// Recording file (JSON)
        #[arg(value_name = "RECORDING")]
        input: PathBuf,

        /// Collector name or inline script source (default: callTracerParity)
        #[arg(short, long)]
        tracer: Option<String>,

        /// Read inline script source from a file
        #[arg(long, value_name = "FILE", conflicts_with = "tracer")]
        tracer_file: Option<PathBuf>,

        /// Wrap results in the Parity nested schema
        #[arg(long)]
        nested: bool,

        /// Execution budget per call (e.g. 500ms, 5s)
        #[arg(long)]
        timeout: Option<String>,

        /// Block to trace on top of (number, hash, latest, pending)
        #[arg(long, default_value = "latest")]
        block: BlockRef,

        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },
}
