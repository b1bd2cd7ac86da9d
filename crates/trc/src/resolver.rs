//! Tracer identifier resolution.
//!
//! An identifier is tried, in order, as a compiled collector name, as a
//! script collector name, and finally as inline script source. The outcome
//! of that classification is a [`Resolution`], computed once per request.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use trc_collect::{Result, TraceContext, Tracer};
use trc_script::{RuleEngine, ScriptEngine};

use crate::metrics;
use crate::registry::{CollectorRegistry, Factory};

/// Where a resolved tracer comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provenance {
    Compiled,
    Scripted,
    Inline,
}

impl Provenance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compiled => "compiled",
            Self::Scripted => "scripted",
            Self::Inline => "inline",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified identifier.
pub enum Resolution<'a> {
    /// Registered compiled collector.
    Compiled { name: &'a str, factory: &'a Factory },
    /// Registered script collector.
    Scripted { name: &'a str, source: &'a str },
    /// The identifier itself is script source.
    Inline { source: &'a str },
}

impl Resolution<'_> {
    pub const fn provenance(&self) -> Provenance {
        match self {
            Self::Compiled { .. } => Provenance::Compiled,
            Self::Scripted { .. } => Provenance::Scripted,
            Self::Inline { .. } => Provenance::Inline,
        }
    }
}

impl fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compiled { name, .. } => f.debug_struct("Compiled").field("name", name).finish(),
            Self::Scripted { name, .. } => f.debug_struct("Scripted").field("name", name).finish(),
            Self::Inline { source } => f
                .debug_struct("Inline")
                .field("len", &source.len())
                .finish(),
        }
    }
}

/// Turns identifiers into live tracers.
///
/// Cheap to clone; the registry and engine are shared.
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<CollectorRegistry>,
    engine: Arc<dyn ScriptEngine>,
}

impl Resolver {
    pub fn new(registry: Arc<CollectorRegistry>, engine: Arc<dyn ScriptEngine>) -> Self {
        Self { registry, engine }
    }

    /// Resolver over `registry` with the rule engine, pre-parsing its scripts.
    pub fn with_registry(registry: Arc<CollectorRegistry>) -> Self {
        let engine = RuleEngine::with_warm_cache(registry.script_sources());
        Self::new(registry, Arc::new(engine))
    }

    /// Resolver over the process-wide registry.
    pub fn with_defaults() -> Self {
        Self::with_registry(CollectorRegistry::global())
    }

    pub fn registry(&self) -> &CollectorRegistry {
        &self.registry
    }

    /// Classify `identifier` without instantiating anything.
    pub fn classify<'a>(&'a self, identifier: &'a str) -> Resolution<'a> {
        if let Some(factory) = self.registry.lookup_compiled(identifier) {
            return Resolution::Compiled {
                name: identifier,
                factory,
            };
        }
        if let Some(source) = self.registry.lookup(identifier) {
            return Resolution::Scripted {
                name: identifier,
                source,
            };
        }
        Resolution::Inline { source: identifier }
    }

    /// Build a fresh tracer for one execution.
    ///
    /// Fails with `Compile` for malformed script source and `ContextBinding`
    /// when the script cannot bind to `ctx`. Unknown names are never an
    /// error of their own: they are compiled as inline source.
    pub fn resolve(&self, identifier: &str, ctx: &TraceContext) -> Result<Box<dyn Tracer>> {
        let resolution = self.classify(identifier);
        let provenance = resolution.provenance();
        debug!(?resolution, "resolving tracer");
        let tracer = match resolution {
            Resolution::Compiled { factory, .. } => Ok(factory(ctx)),
            Resolution::Scripted { source, .. } | Resolution::Inline { source } => {
                self.engine.instantiate(source, ctx)
            }
        };
        metrics::record_resolution(provenance, tracer.is_ok());
        tracer
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
