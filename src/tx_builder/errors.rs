//! Error types for the signing-request assembly pipeline
//!
//! Every failure aborts the current operation and is surfaced to the caller
//! unchanged. Nothing in this layer retries: a partially assembled or
//! stale-blockhash transaction must never reach the signing service.

use crate::tx_builder::format::TransactionFormat;
use thiserror::Error;

/// Error type for all assembly, serialization and payload operations
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// The instruction list is empty or malformed, or the fee payer is missing
    #[error("Invalid instruction set: {0}")]
    InvalidInstructionSet(String),

    /// A serialization path was applied to a message of the other format
    ///
    /// Legacy and v0 encodings are not interchangeable; producing bytes for the
    /// wrong one yields a message the signer rejects or misreads.
    #[error("Format mismatch: expected {expected}, got {actual}")]
    FormatMismatch {
        /// The format the caller asked for
        expected: TransactionFormat,
        /// The format actually carried by the transaction
        actual: TransactionFormat,
    },

    /// A liquidity operation found no position to act on
    #[error("No active position: {0}")]
    NoActivePosition(String),

    /// Blockhash, priority fee, pool info or SDK fetch failed
    #[error("Upstream fetch failed ({source_name}): {reason}")]
    UpstreamFetchFailure {
        /// Which upstream collaborator failed
        source_name: &'static str,
        /// Detailed reason for the failure
        reason: String,
    },

    /// Configuration or validation error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Wrapped error from external crates
    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl AssemblyError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInstructionSet(_) => "instruction_set",
            Self::FormatMismatch { .. } => "format",
            Self::NoActivePosition(_) => "position",
            Self::UpstreamFetchFailure { .. } => "upstream",
            Self::Configuration(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::External(_) => "external",
        }
    }
}

// Convenience constructors for common error scenarios
impl AssemblyError {
    pub fn invalid_instructions(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionSet(reason.into())
    }

    pub fn format_mismatch(expected: TransactionFormat, actual: TransactionFormat) -> Self {
        Self::FormatMismatch { expected, actual }
    }

    pub fn no_active_position(reason: impl Into<String>) -> Self {
        Self::NoActivePosition(reason.into())
    }

    /// Wrap an upstream failure, keeping the full error chain in the reason
    pub fn upstream(source_name: &'static str, err: impl std::fmt::Display) -> Self {
        Self::UpstreamFetchFailure {
            source_name,
            reason: format!("{:#}", err),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }
}

pub type AssemblyResult<T> = Result<T, AssemblyError>;
