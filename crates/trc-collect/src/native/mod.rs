//! Compiled collectors.
//!
//! Each collector is registered by name in the process-wide registry of the
//! `trc` crate.

mod call_parity;
mod noop;
mod state_diff;

pub use call_parity::ParityCallTracer;
pub use noop::NoopTracer;
pub use state_diff::StateDiffTracer;

use crate::{TraceContext, Tracer};

/// Parity-compatible flat call trace collector.
pub const CALL_TRACER_PARITY: &str = "callTracerParity";
/// Parity-compatible state diff collector.
pub const STATE_DIFF_TRACER: &str = "stateDiffTracer";
/// Collector that records nothing.
pub const NOOP_TRACER: &str = "noopTracer";

/// Constructor for a compiled collector.
pub type NativeFactory = fn(&TraceContext) -> Box<dyn Tracer>;

/// All compiled collectors with their canonical names.
pub fn builtin() -> [(&'static str, NativeFactory); 3] {
    [
        (NOOP_TRACER, new_noop),
        (CALL_TRACER_PARITY, new_call_parity),
        (STATE_DIFF_TRACER, new_state_diff),
    ]
}

fn new_noop(_: &TraceContext) -> Box<dyn Tracer> {
    Box::new(NoopTracer::new())
}

fn new_call_parity(ctx: &TraceContext) -> Box<dyn Tracer> {
    Box::new(ParityCallTracer::new(ctx))
}

fn new_state_diff(_: &TraceContext) -> Box<dyn Tracer> {
    Box::new(StateDiffTracer::new())
}
