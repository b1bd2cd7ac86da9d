//! Flat call traces in the Parity/OpenEthereum `trace` dialect.
//!
//! Frames are recorded in pre-order: a frame's entry is created when it
//! opens, so the output order matches the order calls were made.

use alloy_primitives::{Address, Bytes, U256};
use serde_json::{Map, Value, json};
use tracing::trace;

use crate::{
    CallExit, CallFrame, CallKind, Result, StopHandle, TraceContext, Tracer, TxEnv, TxOutcome,
    hex_address, hex_bytes, hex_quantity, hex_word,
};

#[derive(Debug)]
struct Frame {
    kind: CallKind,
    from: Address,
    to: Address,
    /// Deployed address of a create frame, once known.
    created: Option<Address>,
    input: Bytes,
    value: U256,
    gas: u64,
    trace_address: Vec<usize>,
    subtraces: usize,
    gas_used: u64,
    output: Bytes,
    error: Option<String>,
}

impl Frame {
    /// A fresh frame; for create kinds `to` is the deployed address, if known.
    fn open(
        kind: CallKind,
        from: Address,
        to: Option<Address>,
        input: Bytes,
        value: U256,
        gas: u64,
    ) -> Self {
        Self {
            kind,
            from,
            to: to.unwrap_or_default(),
            created: if kind.is_create() { to } else { None },
            input,
            value,
            gas,
            trace_address: Vec::new(),
            subtraces: 0,
            gas_used: 0,
            output: Bytes::new(),
            error: None,
        }
    }

    fn to_json(&self, labels: &Map<String, Value>) -> Value {
        let mut out = Map::new();
        let action = if self.kind.is_create() {
            json!({
                "from": hex_address(&self.from),
                "gas": hex_quantity(U256::from(self.gas)),
                "init": hex_bytes(&self.input),
                "value": hex_quantity(self.value),
            })
        } else {
            json!({
                "callType": self.kind.as_str(),
                "from": hex_address(&self.from),
                "to": hex_address(&self.to),
                "gas": hex_quantity(U256::from(self.gas)),
                "input": hex_bytes(&self.input),
                "value": hex_quantity(self.value),
            })
        };
        out.insert("action".into(), action);

        if let Some(error) = &self.error {
            out.insert("error".into(), error.clone().into());
        } else if self.kind.is_create() {
            let mut result = Map::new();
            if let Some(address) = &self.created {
                result.insert("address".into(), hex_address(address).into());
            }
            result.insert("code".into(), hex_bytes(&self.output).into());
            result.insert("gasUsed".into(), hex_quantity(U256::from(self.gas_used)).into());
            out.insert("result".into(), Value::Object(result));
        } else {
            out.insert(
                "result".into(),
                json!({
                    "gasUsed": hex_quantity(U256::from(self.gas_used)),
                    "output": hex_bytes(&self.output),
                }),
            );
        }

        out.insert("subtraces".into(), self.subtraces.into());
        out.insert("traceAddress".into(), self.trace_address.clone().into());
        let kind = if self.kind.is_create() { "create" } else { "call" };
        out.insert("type".into(), kind.into());
        out.extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(out)
    }
}

/// Parity-style call tracer.
#[derive(Debug)]
pub struct ParityCallTracer {
    labels: Map<String, Value>,
    frames: Vec<Frame>,
    /// Indices into `frames` of the currently open call stack.
    open: Vec<usize>,
    stop: StopHandle,
}

impl ParityCallTracer {
    pub fn new(ctx: &TraceContext) -> Self {
        let mut labels = Map::new();
        if let Some(hash) = &ctx.block_hash {
            labels.insert("blockHash".into(), hex_word(hash).into());
        }
        if let Some(number) = ctx.block_number {
            labels.insert("blockNumber".into(), number.into());
        }
        if let Some(hash) = &ctx.tx_hash {
            labels.insert("transactionHash".into(), hex_word(hash).into());
        }
        if let Some(index) = ctx.tx_index {
            labels.insert("transactionPosition".into(), index.into());
        }
        Self {
            labels,
            frames: Vec::new(),
            open: Vec::new(),
            stop: StopHandle::new(),
        }
    }

    fn open_frame(&mut self, mut frame: Frame) {
        if let Some(&parent) = self.open.last() {
            let parent = &mut self.frames[parent];
            frame.trace_address.clone_from(&parent.trace_address);
            frame.trace_address.push(parent.subtraces);
            parent.subtraces += 1;
        }
        trace!(trace_address = ?frame.trace_address, kind = frame.kind.as_str(), "open frame");
        self.open.push(self.frames.len());
        self.frames.push(frame);
    }

    fn close_frame(&mut self, gas_used: u64, output: &Bytes, error: Option<&String>) {
        let Some(idx) = self.open.pop() else {
            return;
        };
        let frame = &mut self.frames[idx];
        frame.gas_used = gas_used;
        frame.output = output.clone();
        frame.error = error.cloned();
    }
}

impl Tracer for ParityCallTracer {
    fn on_tx_start(&mut self, tx: &TxEnv) {
        if self.stop.is_stopped() {
            return;
        }
        let kind = if tx.to.is_some() {
            CallKind::Call
        } else {
            CallKind::Create
        };
        self.open_frame(Frame::open(
            kind,
            tx.from,
            tx.to,
            tx.input.clone(),
            tx.value,
            tx.gas,
        ));
    }

    fn on_tx_end(&mut self, outcome: &TxOutcome) {
        if self.stop.is_stopped() {
            return;
        }
        // Unwind frames left open by an aborted execution; the root gets the outcome.
        while self.open.len() > 1 {
            self.close_frame(0, &Bytes::new(), outcome.error.as_ref());
        }
        if let (Some(&root), Some(address)) = (self.open.first(), outcome.contract_address) {
            let root = &mut self.frames[root];
            if root.kind.is_create() {
                root.created = Some(address);
            }
        }
        self.close_frame(outcome.gas_used, &outcome.output, outcome.error.as_ref());
    }

    fn on_enter(&mut self, frame: &CallFrame) {
        if self.stop.is_stopped() {
            return;
        }
        self.open_frame(Frame::open(
            frame.kind,
            frame.from,
            Some(frame.to),
            frame.input.clone(),
            frame.value,
            frame.gas,
        ));
    }

    fn on_exit(&mut self, exit: &CallExit) {
        if self.stop.is_stopped() {
            return;
        }
        self.close_frame(exit.gas_used, &exit.output, exit.error.as_ref());
    }

    fn result(&mut self) -> Result<Value> {
        self.stop.check()?;
        Ok(Value::Array(
            self.frames.iter().map(|f| f.to_json(&self.labels)).collect(),
        ))
    }

    fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::*;
    use crate::{StopReason, TraceError};

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn tx() -> TxEnv {
        TxEnv {
            from: addr(1),
            to: Some(addr(2)),
            input: Bytes::from_static(&[0xa9, 0x05, 0x9c, 0xbb]),
            value: U256::from(10),
            gas: 50_000,
        }
    }

    fn enter(to: u8) -> CallFrame {
        CallFrame {
            kind: CallKind::StaticCall,
            from: addr(2),
            to: addr(to),
            gas: 1_000,
            depth: 1,
            ..CallFrame::default()
        }
    }

    fn exit() -> CallExit {
        CallExit {
            gas_used: 100,
            ..CallExit::default()
        }
    }

    #[test]
    fn test_nested_trace_addresses() {
        let mut tracer = ParityCallTracer::new(&TraceContext::default());
        tracer.on_tx_start(&tx());
        tracer.on_enter(&enter(3));
        tracer.on_enter(&enter(4));
        tracer.on_exit(&exit());
        tracer.on_exit(&exit());
        tracer.on_enter(&enter(5));
        tracer.on_exit(&exit());
        tracer.on_tx_end(&TxOutcome {
            gas_used: 21_000,
            ..TxOutcome::default()
        });

        let result = tracer.result().unwrap();
        let traces = result.as_array().unwrap();
        assert_eq!(traces.len(), 4);
        assert_eq!(traces[0]["traceAddress"], json!([]));
        assert_eq!(traces[0]["subtraces"], 2);
        assert_eq!(traces[0]["result"]["gasUsed"], "0x5208");
        assert_eq!(traces[0]["action"]["gas"], "0xc350");
        assert_eq!(traces[0]["action"]["callType"], "call");
        assert_eq!(traces[0]["action"]["value"], "0xa");
        assert_eq!(traces[1]["traceAddress"], json!([0]));
        assert_eq!(traces[1]["subtraces"], 1);
        assert_eq!(traces[2]["traceAddress"], json!([0, 0]));
        assert_eq!(traces[3]["traceAddress"], json!([1]));
        assert_eq!(traces[3]["action"]["callType"], "staticcall");
    }

    #[test]
    fn test_create_and_error() {
        let mut tracer = ParityCallTracer::new(&TraceContext::default());
        tracer.on_tx_start(&TxEnv { to: None, ..tx() });
        tracer.on_enter(&enter(3));
        tracer.on_exit(&CallExit {
            error: Some("execution reverted".into()),
            ..CallExit::default()
        });
        tracer.on_tx_end(&TxOutcome::default());

        let result = tracer.result().unwrap();
        assert_eq!(result[0]["type"], "create");
        assert!(result[0]["action"].get("init").is_some());
        assert!(result[0]["result"].get("address").is_none());
        assert_eq!(result[1]["error"], "execution reverted");
        assert!(result[1].get("result").is_none());
    }

    #[test]
    fn test_create_address_from_outcome() {
        let mut tracer = ParityCallTracer::new(&TraceContext::default());
        tracer.on_tx_start(&TxEnv { to: None, ..tx() });
        tracer.on_enter(&CallFrame {
            kind: CallKind::Create2,
            ..enter(7)
        });
        tracer.on_exit(&exit());
        tracer.on_tx_end(&TxOutcome {
            contract_address: Some(addr(9)),
            ..TxOutcome::default()
        });

        let result = tracer.result().unwrap();
        assert_eq!(result[0]["result"]["address"], hex_address(&addr(9)));
        assert_eq!(result[1]["result"]["address"], hex_address(&addr(7)));
        assert_ne!(result[0]["result"]["address"], hex_address(&Address::ZERO));
    }

    #[test]
    fn test_unwinds_unclosed_frames() {
        let mut tracer = ParityCallTracer::new(&TraceContext::default());
        tracer.on_tx_start(&tx());
        tracer.on_enter(&enter(3));
        tracer.on_tx_end(&TxOutcome {
            error: Some("out of gas".into()),
            ..TxOutcome::default()
        });
        let result = tracer.result().unwrap();
        assert_eq!(result[0]["error"], "out of gas");
        assert_eq!(result[1]["error"], "out of gas");
    }

    #[test]
    fn test_context_labels() {
        let ctx = TraceContext::block(42, B256::repeat_byte(0x11)).with_tx(3, None);
        let mut tracer = ParityCallTracer::new(&ctx);
        tracer.on_tx_start(&tx());
        tracer.on_tx_end(&TxOutcome::default());
        let result = tracer.result().unwrap();
        assert_eq!(result[0]["blockNumber"], 42);
        assert_eq!(result[0]["transactionPosition"], 3);
        assert!(result[0].get("transactionHash").is_none());
    }

    #[test]
    fn test_stop_from_another_thread_during_delivery() {
        let mut tracer = ParityCallTracer::new(&TraceContext::default());
        let handle = tracer.stop_handle().clone();
        tracer.on_tx_start(&tx());

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(1));
            handle.stop(StopReason::Interrupted("client went away".into()))
        });
        let mut delivered = 0;
        while !stopper.is_finished() && delivered < 100_000 {
            tracer.on_enter(&enter(3));
            tracer.on_exit(&exit());
            delivered += 1;
        }
        assert!(stopper.join().unwrap());

        // Further events are ignored once the stop is visible.
        let frames = tracer.frames.len();
        tracer.on_enter(&enter(4));
        tracer.on_tx_end(&TxOutcome::default());
        assert_eq!(tracer.frames.len(), frames);
        assert!(frames <= delivered + 1);

        tracer.stop(StopReason::Timeout(std::time::Duration::from_secs(1)));
        assert_eq!(
            tracer.result(),
            Err(TraceError::Cancelled {
                reason: StopReason::Interrupted("client went away".into())
            })
        );
    }

    #[test]
    fn test_stop_freezes_state() {
        let mut tracer = ParityCallTracer::new(&TraceContext::default());
        tracer.on_tx_start(&tx());
        tracer.stop(StopReason::Interrupted("deadline".into()));
        tracer.stop(StopReason::Interrupted("again".into()));
        tracer.on_enter(&enter(3));
        assert_eq!(tracer.frames.len(), 1);
        assert_eq!(
            tracer.result(),
            Err(TraceError::Cancelled {
                reason: StopReason::Interrupted("deadline".into())
            })
        );
    }
}
