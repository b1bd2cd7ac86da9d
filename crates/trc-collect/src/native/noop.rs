use serde_json::{Value, json};

use crate::{Result, StopHandle, Tracer};

/// Tracer that ignores every event and returns an empty object.
#[derive(Debug, Default)]
pub struct NoopTracer {
    stop: StopHandle,
}

impl NoopTracer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for NoopTracer {
    fn result(&mut self) -> Result<Value> {
        self.stop.check()?;
        Ok(json!({}))
    }

    fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StopReason, TraceError};

    #[test]
    fn test_noop_result() {
        let mut tracer = NoopTracer::new();
        assert_eq!(tracer.result().unwrap(), json!({}));
    }

    #[test]
    fn test_noop_stopped() {
        let mut tracer = NoopTracer::new();
        tracer.stop(StopReason::Interrupted("cancelled by caller".into()));
        assert!(matches!(tracer.result(), Err(TraceError::Cancelled { .. })));
    }
}
