//! Account state diffs in the Parity `stateDiff` dialect.
//!
//! The first observed value of a balance or slot is its `from`, the last
//! written value its `to`. Entries that end where they started are `"="`
//! for balances and omitted for storage.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256, U256};
use serde_json::{Map, Value, json};

use crate::{
    BalanceChange, Result, StopHandle, StorageAccess, Tracer, hex_address, hex_quantity, hex_word,
};

#[derive(Debug, Default)]
struct AccountDiff {
    balance: Option<(U256, U256)>,
    storage: BTreeMap<B256, (B256, B256)>,
}

impl AccountDiff {
    fn is_unchanged(&self) -> bool {
        self.balance.is_none_or(|(from, to)| from == to)
            && self.storage.values().all(|(from, to)| from == to)
    }

    fn to_json(&self) -> Value {
        let balance = match self.balance {
            Some((from, to)) if from != to => json!({
                "*": { "from": hex_quantity(from), "to": hex_quantity(to) }
            }),
            _ => json!("="),
        };
        let storage: Map<String, Value> = self
            .storage
            .iter()
            .filter(|(_, (from, to))| from != to)
            .map(|(slot, (from, to))| {
                (
                    hex_word(slot),
                    json!({ "*": { "from": hex_word(from), "to": hex_word(to) } }),
                )
            })
            .collect();
        json!({
            "balance": balance,
            "code": "=",
            "nonce": "=",
            "storage": storage,
        })
    }
}

/// State diff tracer.
#[derive(Debug, Default)]
pub struct StateDiffTracer {
    accounts: BTreeMap<Address, AccountDiff>,
    stop: StopHandle,
}

impl StateDiffTracer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for StateDiffTracer {
    fn on_storage(&mut self, access: &StorageAccess) {
        if self.stop.is_stopped() {
            return;
        }
        let account = self.accounts.entry(access.address).or_default();
        let entry = account.storage.entry(access.slot).or_insert_with(|| {
            let original = if access.is_write {
                access.previous.unwrap_or_default()
            } else {
                access.value
            };
            (original, original)
        });
        if access.is_write {
            entry.1 = access.value;
        }
    }

    fn on_balance(&mut self, change: &BalanceChange) {
        if self.stop.is_stopped() {
            return;
        }
        let account = self.accounts.entry(change.address).or_default();
        if let Some((_, to)) = &mut account.balance {
            *to = change.after;
        } else {
            account.balance = Some((change.before, change.after));
        }
    }

    fn result(&mut self) -> Result<Value> {
        self.stop.check()?;
        let diff: Map<String, Value> = self
            .accounts
            .iter()
            .filter(|(_, account)| !account.is_unchanged())
            .map(|(address, account)| (hex_address(address), account.to_json()))
            .collect();
        Ok(Value::Object(diff))
    }

    fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StopReason;

    fn write(slot: u8, previous: Option<u8>, value: u8) -> StorageAccess {
        StorageAccess {
            address: Address::repeat_byte(0xcc),
            slot: B256::with_last_byte(slot),
            value: B256::with_last_byte(value),
            is_write: true,
            previous: previous.map(B256::with_last_byte),
        }
    }

    #[test]
    fn test_storage_first_from_last_to() {
        let mut tracer = StateDiffTracer::new();
        tracer.on_storage(&write(1, Some(5), 6));
        tracer.on_storage(&write(1, Some(6), 7));
        let result = tracer.result().unwrap();
        let account = &result[hex_address(&Address::repeat_byte(0xcc))];
        let slot = &account["storage"][hex_word(&B256::with_last_byte(1))]["*"];
        assert_eq!(slot["from"], hex_word(&B256::with_last_byte(5)));
        assert_eq!(slot["to"], hex_word(&B256::with_last_byte(7)));
        assert_eq!(account["balance"], "=");
    }

    #[test]
    fn test_reads_and_reverted_writes_are_omitted() {
        let mut tracer = StateDiffTracer::new();
        tracer.on_storage(&StorageAccess {
            is_write: false,
            ..write(2, None, 9)
        });
        tracer.on_storage(&write(3, Some(4), 8));
        tracer.on_storage(&write(3, Some(8), 4));
        assert_eq!(tracer.result().unwrap(), json!({}));
    }

    #[test]
    fn test_balance_diff() {
        let mut tracer = StateDiffTracer::new();
        let address = Address::repeat_byte(0x01);
        tracer.on_balance(&BalanceChange {
            address,
            before: U256::from(100),
            after: U256::from(90),
        });
        tracer.on_balance(&BalanceChange {
            address,
            before: U256::from(90),
            after: U256::from(80),
        });
        let result = tracer.result().unwrap();
        let balance = &result[hex_address(&address)]["balance"]["*"];
        assert_eq!(balance["from"], "0x64");
        assert_eq!(balance["to"], "0x50");
    }

    #[test]
    fn test_stopped_ignores_events() {
        let mut tracer = StateDiffTracer::new();
        tracer.stop(StopReason::Interrupted("halt".into()));
        tracer.on_storage(&write(1, None, 1));
        assert!(tracer.accounts.is_empty());
        assert!(tracer.result().is_err());
    }
}
