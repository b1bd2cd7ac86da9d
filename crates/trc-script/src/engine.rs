use trc_collect::{Result, TraceContext, Tracer};

/// Script interpreter contract.
///
/// One engine is shared by every resolution, so implementations must be
/// `Send + Sync`. Malformed source fails with
/// [`TraceError::Compile`](trc_collect::TraceError::Compile); a context the
/// script cannot bind to fails with
/// [`TraceError::ContextBinding`](trc_collect::TraceError::ContextBinding).
pub trait ScriptEngine: Send + Sync {
    /// Compile `source` and return a fresh tracer bound to `ctx`.
    fn instantiate(&self, source: &str, ctx: &TraceContext) -> Result<Box<dyn Tracer>>;
}
