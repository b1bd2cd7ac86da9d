//! Nested output for the Parity `trace_*` dialect.
//!
//! Parity responses carry each collector's output under its own key:
//!
//! ```json
//! { "output": "0x", "stateDiff": { ... }, "trace": [ ... ], "vmTrace": { ... } }
//! ```
//!
//! Decoration wraps a raw result under the key matching the collector that
//! produced it. Decorating twice wraps twice, so it must be applied exactly
//! once per response.

use serde_json::{Map, Value};
use trc_collect::native::{CALL_TRACER_PARITY, STATE_DIFF_TRACER};

use crate::config::TraceConfig;

/// Key holding call traces.
pub const TRACE_KEY: &str = "trace";
/// Key holding state diffs.
pub const STATE_DIFF_KEY: &str = "stateDiff";

/// Apply nested output when `config` asks for it and names a collector.
pub fn decorate(result: Value, config: &TraceConfig) -> Value {
    match config.tracer.as_deref() {
        Some(tracer) if config.nested_trace_output => decorate_nested(result, tracer),
        _ => result,
    }
}

/// Wrap `result` under the key for `tracer`.
///
/// Collectors without a Parity key pass through unchanged.
pub fn decorate_nested(result: Value, tracer: &str) -> Value {
    let key = match tracer {
        CALL_TRACER_PARITY => TRACE_KEY,
        STATE_DIFF_TRACER => STATE_DIFF_KEY,
        _ => return result,
    };
    let mut out = Map::new();
    out.insert(key.to_string(), result);
    Value::Object(out)
}
