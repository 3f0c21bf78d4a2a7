//! Transaction wire format selection
//!
//! The format is chosen by caller intent (configuration), never detected from
//! the instructions. It must match the encoding the signing service expects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two mutually incompatible Solana transaction encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionFormat {
    /// Original message format, serialized without a version prefix
    #[serde(rename = "LEGACY", alias = "legacy", alias = "Legacy")]
    Legacy,
    /// v0 message format, serialized with the `0x80` version prefix
    #[serde(rename = "V0", alias = "v0", alias = "versioned", alias = "Versioned")]
    Versioned,
}

impl TransactionFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Versioned => "versioned",
        }
    }
}

impl Default for TransactionFormat {
    fn default() -> Self {
        Self::Versioned
    }
}

impl fmt::Display for TransactionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "v0" | "versioned" => Ok(Self::Versioned),
            other => Err(format!("unknown transaction format '{}'", other)),
        }
    }
}
