//! Execution events delivered to tracers.
//!
//! Events arrive in the program order of the traced execution. The execution
//! collaborator neither reorders nor batches them.

use alloy_primitives::{Address, B256, Bytes, U256, hex};
use serde::{Deserialize, Serialize};

use crate::Tracer;

/// Call frame flavour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallKind {
    #[default]
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
}

impl CallKind {
    /// Lower-case name as used by the Parity trace dialect.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::StaticCall => "staticcall",
            Self::DelegateCall => "delegatecall",
            Self::CallCode => "callcode",
            Self::Create => "create",
            Self::Create2 => "create2",
        }
    }

    pub const fn is_create(self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }
}

/// Transaction-level entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxEnv {
    pub from: Address,
    /// `None` for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub input: Bytes,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas: u64,
}

/// Transaction-level exit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcome {
    #[serde(default)]
    pub gas_used: u64,
    #[serde(default)]
    pub output: Bytes,
    #[serde(default)]
    pub error: Option<String>,
    /// Address of the contract a creation transaction deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
}

/// A nested call frame opening.
///
/// For create frames `to` is the address of the new contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default, rename = "type")]
    pub kind: CallKind,
    pub from: Address,
    pub to: Address,
    #[serde(default)]
    pub input: Bytes,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub gas: u64,
    #[serde(default)]
    pub depth: usize,
}

/// The innermost open frame closing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallExit {
    #[serde(default)]
    pub gas_used: u64,
    #[serde(default)]
    pub output: Bytes,
    #[serde(default)]
    pub error: Option<String>,
}

/// One executed opcode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub pc: u64,
    pub op: String,
    #[serde(default)]
    pub gas: u64,
    #[serde(default)]
    pub gas_cost: u64,
    #[serde(default)]
    pub depth: usize,
}

/// A storage slot read or write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccess {
    pub address: Address,
    pub slot: B256,
    /// Value read, or value written for writes.
    pub value: B256,
    #[serde(default)]
    pub is_write: bool,
    /// Value before a write, when the collaborator knows it.
    #[serde(default)]
    pub previous: Option<B256>,
}

/// An account balance transition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChange {
    pub address: Address,
    pub before: U256,
    pub after: U256,
}

/// A single event, as recorded by replaying collaborators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    TxStart(TxEnv),
    TxEnd(TxOutcome),
    Enter(CallFrame),
    Exit(CallExit),
    Step(Step),
    Storage(StorageAccess),
    Balance(BalanceChange),
}

impl Event {
    /// Push this event into a tracer through the matching hook.
    pub fn deliver(&self, tracer: &mut dyn Tracer) {
        match self {
            Self::TxStart(tx) => tracer.on_tx_start(tx),
            Self::TxEnd(outcome) => tracer.on_tx_end(outcome),
            Self::Enter(frame) => tracer.on_enter(frame),
            Self::Exit(exit) => tracer.on_exit(exit),
            Self::Step(step) => tracer.on_step(step),
            Self::Storage(access) => tracer.on_storage(access),
            Self::Balance(change) => tracer.on_balance(change),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::TxStart(_) => "tx_start",
            Self::TxEnd(_) => "tx_end",
            Self::Enter(_) => "enter",
            Self::Exit(_) => "exit",
            Self::Step(_) => "step",
            Self::Storage(_) => "storage",
            Self::Balance(_) => "balance",
        }
    }
}

/// Lower-case `0x` address.
pub fn hex_address(address: &Address) -> String {
    hex::encode_prefixed(address.as_slice())
}

/// Lower-case `0x` byte string.
pub fn hex_bytes(bytes: &[u8]) -> String {
    hex::encode_prefixed(bytes)
}

/// Lower-case `0x` 32-byte word.
pub fn hex_word(word: &B256) -> String {
    hex::encode_prefixed(word.as_slice())
}

/// `0x` quantity without leading zeros.
pub fn hex_quantity(value: U256) -> String {
    format!("0x{value:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let raw = r#"{
            "event": "enter",
            "type": "STATICCALL",
            "from": "0x00000000000000000000000000000000000000aa",
            "to": "0x00000000000000000000000000000000000000bb",
            "input": "0xa9059cbb",
            "gas": 100
        }"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        let Event::Enter(frame) = &event else {
            panic!("expected enter, got {event:?}");
        };
        assert_eq!(frame.kind, CallKind::StaticCall);
        assert_eq!(frame.value, U256::ZERO);
        assert_eq!(frame.input.len(), 4);
        assert_eq!(event.name(), "enter");
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(hex_quantity(U256::ZERO), "0x0");
        assert_eq!(hex_quantity(U256::from(255u64)), "0xff");
        assert_eq!(hex_quantity(U256::MAX).len(), 66);
        assert_eq!(
            hex_address(&Address::repeat_byte(0xAB)),
            "0xabababababababababababababababababababab"
        );
        assert!(hex_word(&B256::ZERO).ends_with("00"));
        assert_eq!(hex_word(&B256::ZERO).len(), 66);
    }

    #[test]
    fn test_call_kind_names() {
        assert_eq!(CallKind::DelegateCall.as_str(), "delegatecall");
        assert!(CallKind::Create2.is_create());
        assert!(!CallKind::Call.is_create());
    }
}
