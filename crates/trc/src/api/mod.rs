//! Trace entry points.
//!
//! [`TraceApi`] fills in the tracer configuration, hands the work to an
//! [`Executor`] and decorates whatever comes back.

mod block;
mod replay;

use std::time::Instant;

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info_span};
use trc_collect::native::CALL_TRACER_PARITY;

use crate::config::{TraceCallConfig, TraceConfig};
use crate::decorate::decorate;
use crate::error::Result;
use crate::metrics;
use crate::resolver::Resolver;

pub use block::BlockRef;
pub use replay::{BlockHeader, RecordedCall, Recording, ReplayError, ReplayExecutor};

/// A simulated call, as in `eth_call`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default)]
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default, alias = "data")]
    pub input: Bytes,
    #[serde(default)]
    pub value: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
}

/// Execution collaborator.
///
/// Runs `calls` in order on top of the state at `block`, tracing each one
/// with a tracer resolved from `config`. Each call gets its own tracer.
///
/// The result must be a JSON array with exactly one entry per call, in call
/// order: [`TraceApi`] decorates each entry as that call's result. A
/// collector output that is itself an array (such as a flat Parity trace)
/// is one entry, not the outer array.
pub trait Executor: Send + Sync {
    fn trace_call_many(
        &self,
        calls: &[CallRequest],
        block: &BlockRef,
        config: &TraceCallConfig,
        resolver: &Resolver,
    ) -> Result<Value>;
}

/// Fill in the default collector for call tracing.
pub fn with_default_tracer(config: Option<TraceCallConfig>) -> TraceCallConfig {
    let mut config = config.unwrap_or_default();
    if config.trace.tracer.is_none() {
        config.trace.tracer = Some(CALL_TRACER_PARITY.to_string());
    }
    config
}

/// Decorate a batch result: per entry when it is a list, otherwise as a whole.
fn decorate_batch(result: Value, config: &TraceConfig) -> Value {
    match result {
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|r| decorate(r, config)).collect())
        }
        other => decorate(other, config),
    }
}

/// `trace_*` namespace.
#[derive(Debug)]
pub struct TraceApi<E> {
    executor: E,
    resolver: Resolver,
}

impl<E: Executor> TraceApi<E> {
    pub const fn new(executor: E, resolver: Resolver) -> Self {
        Self { executor, resolver }
    }

    pub const fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Trace `calls` on top of `block`, one result per call.
    ///
    /// Without a tracer in `config`, calls are traced with `callTracerParity`.
    pub fn call_many(
        &self,
        calls: &[CallRequest],
        block: &BlockRef,
        config: Option<TraceCallConfig>,
    ) -> Result<Value> {
        let config = with_default_tracer(config);
        // Reject a bad budget before any work starts.
        config.trace.timeout()?;

        let _span = info_span!("trace_call_many", %block, calls = calls.len()).entered();
        debug!(
            tracer = ?config.trace.tracer,
            nested = config.trace.nested_trace_output,
            "tracing calls"
        );

        let started = Instant::now();
        let raw = self
            .executor
            .trace_call_many(calls, block, &config, &self.resolver)?;
        metrics::record_batch(started.elapsed());

        Ok(decorate_batch(raw, &config.trace))
    }

    /// Trace a single call on top of `block`.
    pub fn call(
        &self,
        call: &CallRequest,
        block: &BlockRef,
        config: Option<TraceCallConfig>,
    ) -> Result<Value> {
        match self.call_many(std::slice::from_ref(call), block, config)? {
            Value::Array(mut items) if items.len() == 1 => Ok(items.remove(0)),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    /// Executor that records the config it was given.
    #[derive(Default)]
    struct CapturingExecutor {
        seen: Mutex<Option<TraceCallConfig>>,
        reply: Value,
    }

    impl Executor for CapturingExecutor {
        fn trace_call_many(
            &self,
            _calls: &[CallRequest],
            _block: &BlockRef,
            config: &TraceCallConfig,
            _resolver: &Resolver,
        ) -> Result<Value> {
            *self.seen.lock().unwrap() = Some(config.clone());
            Ok(self.reply.clone())
        }
    }

    fn api(reply: Value) -> TraceApi<CapturingExecutor> {
        let executor = CapturingExecutor {
            reply,
            ..CapturingExecutor::default()
        };
        TraceApi::new(executor, Resolver::with_defaults())
    }

    #[test]
    fn test_default_tracer_applied() {
        let api = api(json!([]));
        api.call_many(&[], &BlockRef::Latest, None).unwrap();
        let seen = api.executor().seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.trace.tracer.as_deref(), Some(CALL_TRACER_PARITY));

        let config = TraceConfig::default().with_tracer("noopTracer");
        api.call_many(&[], &BlockRef::Latest, Some(config.into()))
            .unwrap();
        let seen = api.executor().seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.trace.tracer.as_deref(), Some("noopTracer"));
    }

    #[test]
    fn test_batch_decorated_per_call() {
        let api = api(json!([[1], [2]]));
        let config = TraceConfig::default().nested(true);
        let out = api
            .call_many(&[], &BlockRef::Pending, Some(config.into()))
            .unwrap();
        assert_eq!(out, json!([{ "trace": [1] }, { "trace": [2] }]));
    }

    #[test]
    fn test_flat_trace_entry_wrapped_whole() {
        let frames = json!([{ "traceAddress": [] }, { "traceAddress": [0] }]);
        let api = api(json!([frames.clone()]));
        let config = TraceConfig::default().nested(true);
        let out = api
            .call_many(&[CallRequest::default()], &BlockRef::Latest, Some(config.into()))
            .unwrap();
        assert_eq!(out, json!([{ "trace": frames }]));
    }

    #[test]
    fn test_single_call_unwrapped() {
        let api = api(json!([{ "0x": 1 }]));
        let config = TraceConfig::default()
            .with_tracer("stateDiffTracer")
            .nested(true);
        let out = api
            .call(&CallRequest::default(), &BlockRef::Number(1), Some(config.into()))
            .unwrap();
        assert_eq!(out, json!({ "stateDiff": { "0x": 1 } }));
    }

    #[test]
    fn test_bad_timeout_rejected_before_execution() {
        let api = api(json!([]));
        let config = TraceConfig::default().with_timeout("forever");
        assert!(api.call_many(&[], &BlockRef::Latest, Some(config.into())).is_err());
        assert!(api.executor().seen.lock().unwrap().is_none());
    }

    #[test]
    fn test_call_request_accepts_data_alias() {
        let call: CallRequest = serde_json::from_value(json!({
            "to": "0x00000000000000000000000000000000000000aa",
            "data": "0x01"
        }))
        .unwrap();
        assert_eq!(call.input.len(), 1);
        assert!(call.gas.is_none());
    }
}
