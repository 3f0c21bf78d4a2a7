//! Message assembly
//!
//! Turns an [`InstructionSource`] into an [`AssembledTransaction`]: the
//! unsigned message in its canonical container, plus whatever signature slots
//! that container carries.
//!
//! - `Raw` + `Versioned`: compile a v0 message (no lookup tables)
//! - `Raw` + `Legacy`: legacy message with blockhash and fee payer set,
//!   instructions in received order
//! - `Prebuilt`: reused verbatim, only checked against the requested format

use crate::tx_builder::errors::{AssemblyError, AssemblyResult};
use crate::tx_builder::format::TransactionFormat;
use crate::tx_builder::instructions::{validate_instructions, InstructionSource, PrebuiltTransaction};
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, Message, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, VersionedTransaction},
};
use tracing::debug;

/// An unsigned transaction in the container matching its wire format
#[derive(Debug, Clone)]
pub enum AssembledTransaction {
    Legacy(Transaction),
    Versioned(VersionedTransaction),
}

impl AssembledTransaction {
    /// The format of the message actually held
    pub fn format(&self) -> TransactionFormat {
        match self {
            Self::Legacy(_) => TransactionFormat::Legacy,
            Self::Versioned(tx) => match tx.message {
                VersionedMessage::Legacy(_) => TransactionFormat::Legacy,
                VersionedMessage::V0(_) => TransactionFormat::Versioned,
            },
        }
    }

    pub fn signatures(&self) -> &[Signature] {
        match self {
            Self::Legacy(tx) => &tx.signatures,
            Self::Versioned(tx) => &tx.signatures,
        }
    }

    pub fn recent_blockhash(&self) -> &Hash {
        match self {
            Self::Legacy(tx) => &tx.message.recent_blockhash,
            Self::Versioned(tx) => tx.message.recent_blockhash(),
        }
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        match self {
            Self::Legacy(tx) => tx.message.account_keys.first(),
            Self::Versioned(tx) => tx.message.static_account_keys().first(),
        }
    }

    pub fn instruction_count(&self) -> usize {
        match self {
            Self::Legacy(tx) => tx.message.instructions.len(),
            Self::Versioned(tx) => tx.message.instructions().len(),
        }
    }
}

/// Assemble an unsigned transaction for `format`
///
/// # Errors
///
/// - `InvalidInstructionSet` for an empty list, a default fee payer, a
///   pre-built transaction without instructions, or a v0 compile failure
/// - `FormatMismatch` when a pre-built transaction is in the other format
pub fn assemble(
    fee_payer: &Pubkey,
    recent_blockhash: Hash,
    source: InstructionSource,
    format: TransactionFormat,
) -> AssemblyResult<AssembledTransaction> {
    match source {
        InstructionSource::Raw(instructions) => {
            if *fee_payer == Pubkey::default() {
                return Err(AssemblyError::invalid_instructions("fee payer is missing"));
            }
            validate_instructions(&instructions)?;
            let assembled = match format {
                TransactionFormat::Versioned => {
                    compile_versioned(fee_payer, &instructions, recent_blockhash)?
                }
                TransactionFormat::Legacy => compile_legacy(fee_payer, &instructions, recent_blockhash),
            };
            debug!(
                format = %format,
                instructions = instructions.len(),
                signature_slots = assembled.signatures().len(),
                "Assembled message from raw instructions"
            );
            Ok(assembled)
        }
        InstructionSource::Prebuilt(prebuilt) => assemble_prebuilt(prebuilt, format),
    }
}

fn compile_versioned(
    fee_payer: &Pubkey,
    instructions: &[Instruction],
    recent_blockhash: Hash,
) -> AssemblyResult<AssembledTransaction> {
    let message = v0::Message::try_compile(fee_payer, instructions, &[], recent_blockhash)
        .map_err(|e| AssemblyError::invalid_instructions(format!("v0 compile failed: {}", e)))?;

    // One unsigned slot per required signer, as the signing service expects
    let num_signers = message.header.num_required_signatures as usize;
    Ok(AssembledTransaction::Versioned(VersionedTransaction {
        signatures: vec![Signature::default(); num_signers],
        message: VersionedMessage::V0(message),
    }))
}

fn compile_legacy(
    fee_payer: &Pubkey,
    instructions: &[Instruction],
    recent_blockhash: Hash,
) -> AssembledTransaction {
    let message = Message::new_with_blockhash(instructions, Some(fee_payer), &recent_blockhash);
    AssembledTransaction::Legacy(Transaction::new_unsigned(message))
}

/// Reuse a pre-built transaction as-is after checking its format
///
/// Pre-built transactions carry their own blockhash, fee payer and any
/// co-signatures, so nothing is recompiled.
pub fn assemble_prebuilt(
    prebuilt: PrebuiltTransaction,
    format: TransactionFormat,
) -> AssemblyResult<AssembledTransaction> {
    if prebuilt.instruction_count() == 0 {
        return Err(AssemblyError::invalid_instructions(
            "pre-built transaction has no instructions",
        ));
    }

    let assembled = match (prebuilt, format) {
        (PrebuiltTransaction::Legacy(tx), TransactionFormat::Legacy) => {
            AssembledTransaction::Legacy(tx)
        }
        (PrebuiltTransaction::Legacy(_), TransactionFormat::Versioned) => {
            return Err(AssemblyError::format_mismatch(
                TransactionFormat::Versioned,
                TransactionFormat::Legacy,
            ));
        }
        (PrebuiltTransaction::Versioned(tx), TransactionFormat::Versioned) => {
            if !matches!(tx.message, VersionedMessage::V0(_)) {
                return Err(AssemblyError::format_mismatch(
                    TransactionFormat::Versioned,
                    TransactionFormat::Legacy,
                ));
            }
            AssembledTransaction::Versioned(tx)
        }
        (PrebuiltTransaction::Versioned(tx), TransactionFormat::Legacy) => {
            // A versioned container may still hold a legacy message
            match tx.into_legacy_transaction() {
                Some(legacy) => AssembledTransaction::Legacy(legacy),
                None => {
                    return Err(AssemblyError::format_mismatch(
                        TransactionFormat::Legacy,
                        TransactionFormat::Versioned,
                    ));
                }
            }
        }
    };

    debug!(
        format = %format,
        instructions = assembled.instruction_count(),
        signature_slots = assembled.signatures().len(),
        "Reusing pre-built transaction"
    );
    Ok(assembled)
}
