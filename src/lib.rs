//! Vault TX - custodial signing-request assembly for Solana DEX operations
//!
//! Builds unsigned legacy or v0 messages from liquidity-SDK instructions and
//! packages them for an MPC signing service.

pub mod config;
pub mod metrics;
pub mod observability;
pub mod rpc;
pub mod sdk;

// Assembly core and operation pipeline
pub mod tx_builder;

// Re-export commonly used types
pub use config::Config;
pub use tx_builder::{AssemblyError, AssemblyResult, Operation, SigningRequestPayload, TransactionFormat, TxBuilder};
