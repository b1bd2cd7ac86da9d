//! TRC - tracer resolution and trace output shaping.
//!
//! Turns a tracer identifier (a compiled collector name, a bundled script
//! name, or inline script source) into a live tracer, runs it over a batch of
//! calls through an execution collaborator, and reshapes the result for the
//! caller's RPC dialect.
//!
//! # Example
//!
//! ```ignore
//! use trc::{BlockRef, ReplayExecutor, Resolver, TraceApi, TraceConfig};
//!
//! let executor = ReplayExecutor::from_file("recording.json".as_ref())?;
//! let calls: Vec<_> = executor.recording().calls.iter().map(|c| c.call.clone()).collect();
//! let api = TraceApi::new(executor, Resolver::with_defaults());
//! let config = TraceConfig::default().nested(true);
//! let traces = api.call_many(&calls, &BlockRef::Latest, Some(config.into()))?;
//! ```

// Re-export from sub-crates
pub use trc_collect::{
    ContextField, Event, StopHandle, StopReason, TraceContext, TraceError, Tracer, native,
};
pub use trc_script::{RuleEngine, ScriptEngine};

pub mod api;
pub mod config;
pub mod decorate;
mod error;
pub mod metrics;
pub mod registry;
pub mod resolver;

pub use api::{
    BlockHeader, BlockRef, CallRequest, Executor, RecordedCall, Recording, ReplayError,
    ReplayExecutor, TraceApi, with_default_tracer,
};
pub use config::{MAX_DURATION, TraceCallConfig, TraceConfig, parse_duration};
pub use decorate::{STATE_DIFF_KEY, TRACE_KEY, decorate, decorate_nested};
pub use error::{ApiError, Result};
pub use registry::{CollectorRegistry, Factory, RegistryBuilder, RegistryError, camel};
pub use resolver::{Provenance, Resolution, Resolver};
