//! Block and transaction coordinates handed to a tracer at construction.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::event::hex_word;

/// Positional information a collector can use to label its output.
///
/// Opaque to resolution; only collectors interpret it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

impl TraceContext {
    /// Context scoped to a block.
    pub const fn block(number: u64, hash: B256) -> Self {
        Self {
            block_number: Some(number),
            block_hash: Some(hash),
            tx_index: None,
            tx_hash: None,
        }
    }

    /// Narrow the context to a transaction within the block.
    #[must_use]
    pub const fn with_tx(mut self, index: usize, hash: Option<B256>) -> Self {
        self.tx_index = Some(index);
        self.tx_hash = hash;
        self
    }

    /// Look up a field as a JSON value, `None` when it is not set.
    pub fn field(&self, field: ContextField) -> Option<serde_json::Value> {
        match field {
            ContextField::BlockNumber => self.block_number.map(Into::into),
            ContextField::BlockHash => self.block_hash.map(|h| hex_word(&h).into()),
            ContextField::TxIndex => self.tx_index.map(Into::into),
            ContextField::TxHash => self.tx_hash.map(|h| hex_word(&h).into()),
        }
    }
}

/// Named context fields, as referenced by script collectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextField {
    BlockNumber,
    BlockHash,
    TxIndex,
    TxHash,
}

impl ContextField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlockNumber => "block_number",
            Self::BlockHash => "block_hash",
            Self::TxIndex => "tx_index",
            Self::TxHash => "tx_hash",
        }
    }
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block_number" => Ok(Self::BlockNumber),
            "block_hash" => Ok(Self::BlockHash),
            "tx_index" => Ok(Self::TxIndex),
            "tx_hash" => Ok(Self::TxHash),
            other => Err(format!("unknown context field '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_fields() {
        let ctx = TraceContext::block(7, B256::repeat_byte(0xab)).with_tx(3, None);
        assert_eq!(ctx.field(ContextField::BlockNumber), Some(7.into()));
        assert_eq!(ctx.field(ContextField::TxIndex), Some(3.into()));
        assert!(ctx.field(ContextField::TxHash).is_none());
        let hash = ctx.field(ContextField::BlockHash).unwrap();
        assert!(hash.as_str().unwrap().starts_with("0xabab"));
    }

    #[test]
    fn test_context_field_parse() {
        for field in [
            ContextField::BlockNumber,
            ContextField::BlockHash,
            ContextField::TxIndex,
            ContextField::TxHash,
        ] {
            assert_eq!(field.as_str().parse::<ContextField>().unwrap(), field);
        }
        assert!("gas".parse::<ContextField>().is_err());
    }
}
