//! Command implementations.

use std::path::Path;
use std::sync::Arc;

use console::style;
use tracing::{error, info};
use trc::{
    BlockRef, CollectorRegistry, RegistryBuilder, RegistryError, ReplayExecutor, Resolver,
    TraceApi, TraceConfig,
};

use crate::cli::{Cli, Commands, EXIT_FAILURE, EXIT_SUCCESS};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    let registry = match load_registry(cli.scripts.as_deref()) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "failed to build collector registry");
            return EXIT_FAILURE;
        }
    };

    match &cli.command {
        Commands::List => cmd_list(&registry),
        Commands::Show { name } => cmd_show(&registry, name),
        Commands::Trace {
            input,
            tracer,
            tracer_file,
            nested,
            timeout,
            block,
            pretty,
        } => {
            let tracer = match tracer_source(tracer.as_deref(), tracer_file.as_deref()) {
                Ok(tracer) => tracer,
                Err(code) => return code,
            };
            let mut config = TraceConfig::default().nested(*nested);
            config.tracer = tracer;
            config.timeout.clone_from(timeout);
            cmd_trace(registry, input, config, block, *pretty)
        }
    }
}

/// Global registry, or a fresh one when extra scripts are requested.
fn load_registry(scripts: Option<&Path>) -> Result<Arc<CollectorRegistry>, RegistryError> {
    let Some(dir) = scripts else {
        return Ok(CollectorRegistry::global());
    };
    let mut builder = RegistryBuilder::with_builtins()?;
    builder.load_script_dir(dir)?;
    Ok(Arc::new(builder.build()))
}

fn tracer_source(tracer: Option<&str>, file: Option<&Path>) -> Result<Option<String>, i32> {
    match file {
        Some(path) => std::fs::read_to_string(path).map(Some).map_err(|e| {
            error!(error = %e, path = %path.display(), "failed to read tracer file");
            EXIT_FAILURE
        }),
        None => Ok(tracer.map(str::to_string)),
    }
}

fn cmd_list(registry: &CollectorRegistry) -> i32 {
    println!("{}", style("compiled").bold());
    for name in registry.compiled_names() {
        println!("  {name}");
    }
    println!("{}", style("scripted").bold());
    for name in registry.script_names() {
        println!("  {name}");
    }
    EXIT_SUCCESS
}

fn cmd_show(registry: &CollectorRegistry, name: &str) -> i32 {
    if let Some(source) = registry.lookup(name) {
        print!("{source}");
        return EXIT_SUCCESS;
    }
    if registry.lookup_compiled(name).is_some() {
        println!("{name} is a compiled collector");
        return EXIT_SUCCESS;
    }
    error!(name, "no such collector");
    EXIT_FAILURE
}

fn cmd_trace(
    registry: Arc<CollectorRegistry>,
    input: &Path,
    config: TraceConfig,
    block: &BlockRef,
    pretty: bool,
) -> i32 {
    let executor = match ReplayExecutor::from_file(input) {
        Ok(executor) => executor,
        Err(e) => {
            error!(error = %e, "failed to load recording");
            return EXIT_FAILURE;
        }
    };
    let calls: Vec<_> = executor
        .recording()
        .calls
        .iter()
        .map(|r| r.call.clone())
        .collect();
    info!(path = %input.display(), calls = calls.len(), "loaded recording");

    let api = TraceApi::new(executor, Resolver::with_registry(registry));
    let result = match api.call_many(&calls, block, Some(config.into())) {
        Ok(result) => result,
        Err(e) => {
            match e.stop_reason() {
                Some(reason) => error!(%reason, "trace stopped before completion"),
                None => error!(error = %e, "trace failed"),
            }
            return EXIT_FAILURE;
        }
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    };
    match rendered {
        Ok(json) => {
            println!("{json}");
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to encode result");
            EXIT_FAILURE
        }
    }
}
