//! Cooperative cancellation shared between a tracer and its watchdogs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::{StopReason, TraceError};

/// Cloneable stop request slot.
///
/// The first [`stop`](Self::stop) records the reason; later calls are ignored
/// so a stopped tracer always reports one consistent cause.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

#[derive(Debug, Default)]
struct StopState {
    stopped: AtomicBool,
    reason: Mutex<Option<StopReason>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the tracer to stop at its next event boundary.
    ///
    /// Returns `true` if this call recorded the reason.
    pub fn stop(&self, reason: StopReason) -> bool {
        let mut slot = self.inner.reason.lock();
        if slot.is_some() {
            return false;
        }
        warn!(%reason, "tracer stop requested");
        *slot = Some(reason);
        self.inner.stopped.store(true, Ordering::Release);
        true
    }

    /// Cheap check for the event hot path.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.inner.reason.lock().clone()
    }

    /// `Err(Cancelled)` once stopped.
    pub fn check(&self) -> Result<(), TraceError> {
        match self.reason() {
            Some(reason) => Err(TraceError::Cancelled { reason }),
            None => Ok(()),
        }
    }
}
