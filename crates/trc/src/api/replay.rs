//! Executor that replays recorded event streams.
//!
//! A [`Recording`] captures the events a VM emitted for a batch of calls
//! against one block. Replaying feeds those events, in recorded order, into
//! freshly resolved tracers, which is enough to exercise every collector
//! without a live node.

use std::path::Path;
use std::time::{Duration, Instant};

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};
use trc_collect::{Event, StopReason, TraceContext};

use super::{BlockRef, CallRequest, Executor};
use crate::config::TraceCallConfig;
use crate::error::{ApiError, Result};
use crate::metrics;
use crate::resolver::Resolver;

/// Block the recording was taken against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
}

/// One call and the events it produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedCall {
    pub call: CallRequest,
    #[serde(default)]
    pub events: Vec<Event>,
    /// Execution-level failure, such as insufficient funds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A batch of recorded calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub block: BlockHeader,
    pub calls: Vec<RecordedCall>,
}

/// Replay failures. These are the executor's own errors and reach callers
/// as [`ApiError::Execution`].
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("block {requested} not available (recording is for block {recorded:#x})")]
    UnknownBlock { requested: BlockRef, recorded: u64 },

    #[error("no recording for call #{index}")]
    MissingCall { index: usize },

    #[error("call #{index} failed: {message}")]
    CallFailed { index: usize, message: String },

    #[error("failed to load recording: {0}")]
    Load(String),
}

/// Replaying execution collaborator.
#[derive(Clone, Debug)]
pub struct ReplayExecutor {
    recording: Recording,
}

impl ReplayExecutor {
    pub const fn new(recording: Recording) -> Self {
        Self { recording }
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, ReplayError> {
        serde_json::from_str(json)
            .map(Self::new)
            .map_err(|e| ReplayError::Load(e.to_string()))
    }

    pub fn from_file(path: &Path) -> std::result::Result<Self, ReplayError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ReplayError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub const fn recording(&self) -> &Recording {
        &self.recording
    }

    fn check_block(&self, block: &BlockRef) -> std::result::Result<(), ReplayError> {
        let header = &self.recording.block;
        let matches = match block {
            BlockRef::Number(n) => *n == header.number,
            BlockRef::Hash(hash) => *hash == header.hash,
            BlockRef::Latest | BlockRef::Pending => true,
        };
        if matches {
            Ok(())
        } else {
            Err(ReplayError::UnknownBlock {
                requested: *block,
                recorded: header.number,
            })
        }
    }

    fn replay_one(
        &self,
        index: usize,
        recorded: &RecordedCall,
        tracer_id: &str,
        budget: Option<Duration>,
        resolver: &Resolver,
    ) -> Result<Value> {
        let header = &self.recording.block;
        let ctx = TraceContext::block(header.number, header.hash).with_tx(index, None);
        let mut tracer = resolver.resolve(tracer_id, &ctx)?;

        if let Some(message) = &recorded.error {
            return Err(ApiError::execution(ReplayError::CallFailed {
                index,
                message: message.clone(),
            }));
        }

        let expires = deadline(budget);
        for event in &recorded.events {
            if let Some((budget, _)) = expires.filter(|(_, at)| Instant::now() >= *at) {
                warn!(index, ?budget, "trace budget exceeded");
                if tracer.stop_handle().stop(StopReason::Timeout(budget)) {
                    metrics::record_stop();
                }
                break;
            }
            trace!(index, event = event.name(), "deliver");
            event.deliver(tracer.as_mut());
        }
        Ok(tracer.result()?)
    }
}

/// Budget and the instant it runs out; `None` when the budget is unset or
/// reaches past what the clock can represent.
fn deadline(budget: Option<Duration>) -> Option<(Duration, Instant)> {
    let budget = budget?;
    Instant::now().checked_add(budget).map(|at| (budget, at))
}

impl Executor for ReplayExecutor {
    fn trace_call_many(
        &self,
        calls: &[CallRequest],
        block: &BlockRef,
        config: &TraceCallConfig,
        resolver: &Resolver,
    ) -> Result<Value> {
        self.check_block(block).map_err(ApiError::execution)?;
        let budget = config.trace.timeout()?;
        let tracer_id = config.trace.tracer.as_deref().unwrap_or_default();

        let mut results = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            let recorded = self
                .recording
                .calls
                .get(index)
                .filter(|r| r.call == *call)
                .ok_or_else(|| ApiError::execution(ReplayError::MissingCall { index }))?;
            debug!(index, events = recorded.events.len(), "replaying call");
            results.push(self.replay_one(index, recorded, tracer_id, budget, resolver)?);
        }
        Ok(Value::Array(results))
    }
}
