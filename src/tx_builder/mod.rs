//! Transaction assembly and signing-request serialization
//!
//! Takes instructions (or a finished transaction) from the liquidity SDK and
//! produces the exact request the custodial signing service expects.
//!
//! ## Architecture
//!
//! - **errors**: `AssemblyError` taxonomy with stable categories
//! - **format**: legacy vs versioned (v0) wire format
//! - **instructions**: instruction sources, validation and tip merging
//! - **assembler**: unsigned message assembly per format
//! - **serializer**: base64 message encoding and decoding
//! - **signatures**: co-signature slot resolution
//! - **payload**: request payload and authentication string
//! - **builder**: the operation pipeline tying the above together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use vault_tx::tx_builder::{assemble, serialize_message, resolve_transaction_slots};
//! use vault_tx::tx_builder::{InstructionSource, SigningRequestPayload, TransactionFormat};
//! # use solana_sdk::{hash::Hash, instruction::Instruction, pubkey::Pubkey};
//! # fn example(vault: Pubkey, blockhash: Hash, ixs: Vec<Instruction>) -> anyhow::Result<()> {
//! let format = TransactionFormat::Versioned;
//! let tx = assemble(&vault, blockhash, InstructionSource::Raw(ixs), format)?;
//! let data = serialize_message(&tx, format)?;
//! let payload = SigningRequestPayload::new(
//!     "vault-id",
//!     data,
//!     false,
//!     "solana_mainnet",
//!     resolve_transaction_slots(&tx),
//! );
//! println!("{}", payload.to_request_body()?);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod builder;
pub mod errors;
pub mod format;
pub mod instructions;
pub mod payload;
pub mod serializer;
pub mod signatures;

pub use assembler::{assemble, assemble_prebuilt, AssembledTransaction};
pub use builder::{Operation, TxBuilder};
pub use errors::{AssemblyError, AssemblyResult};
pub use format::TransactionFormat;
pub use instructions::{
    merge_tip, validate_instructions, InstructionSource, PrebuiltTransaction, TipPlacement,
    TipPlan,
};
pub use payload::{PreparedRequest, PushMode, SigningRequestPayload};
pub use serializer::{serialize_message, SerializedMessage};
pub use signatures::{resolve_signature_slots, resolve_transaction_slots, SignatureSlot};
