use std::fmt;
use std::str::FromStr;

use alloy_primitives::B256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Block a batch of calls executes on top of.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockRef {
    Number(u64),
    Hash(B256),
    #[default]
    Latest,
    /// The pending block; `-2` in the numeric RPC encoding.
    Pending,
}

impl BlockRef {
    /// Numeric RPC encoding: `-1` is latest, `-2` pending.
    pub fn from_i64(n: i64) -> Result<Self, String> {
        match n {
            -2 => Ok(Self::Pending),
            -1 => Ok(Self::Latest),
            n => u64::try_from(n)
                .map(Self::Number)
                .map_err(|_| format!("invalid block number {n}")),
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n:#x}"),
            Self::Hash(hash) => write!(f, "{}", trc_collect::hex_word(hash)),
            Self::Latest => f.write_str("latest"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

impl FromStr for BlockRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => return Ok(Self::Latest),
            "pending" => return Ok(Self::Pending),
            "earliest" => return Ok(Self::Number(0)),
            _ => {}
        }
        if let Some(hex) = s.strip_prefix("0x") {
            if hex.len() == 64 {
                return s
                    .parse::<B256>()
                    .map(Self::Hash)
                    .map_err(|e| format!("invalid block hash {s}: {e}"));
            }
            return u64::from_str_radix(hex, 16)
                .map(Self::Number)
                .map_err(|e| format!("invalid block number {s}: {e}"));
        }
        s.parse::<i64>()
            .map_err(|_| format!("invalid block reference '{s}'"))
            .and_then(Self::from_i64)
    }
}

impl Serialize for BlockRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Self::from_i64(n),
            Raw::Str(s) => s.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}
