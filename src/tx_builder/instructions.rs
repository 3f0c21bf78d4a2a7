//! Instruction sources and tip merging
//!
//! The external SDK hands back either a plain instruction list or a
//! transaction it already built (and possibly co-signed). That distinction is
//! carried as an explicit [`InstructionSource`] variant so the assembler can
//! match on it instead of inspecting runtime types.
//!
//! ## Tip placement
//! When the alternate relay is used, a system transfer to the relay's tip
//! account is merged into the instruction list:
//! - `Prepend`: tip first, SDK instructions after it in received order
//! - `Append`: SDK instructions in received order, tip last
//!
//! Tips are merged only into `Raw` sources. A pre-built transaction may already
//! carry a co-signature over its message; editing the message would void it.

use crate::tx_builder::errors::{AssemblyError, AssemblyResult};
use crate::tx_builder::format::TransactionFormat;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    transaction::{Transaction, VersionedTransaction},
};
// TODO(migrate-system-instruction): move to solana-system-interface with the 3.x bump
#[allow(deprecated)]
use solana_sdk::system_instruction;

/// Where instructions for one operation come from
#[derive(Debug, Clone)]
pub enum InstructionSource {
    /// Instructions to be compiled into a fresh message
    Raw(Vec<Instruction>),
    /// A transaction the SDK already assembled; reused verbatim
    Prebuilt(PrebuiltTransaction),
}

impl InstructionSource {
    /// Number of top-level instructions this source will contribute
    pub fn instruction_count(&self) -> usize {
        match self {
            Self::Raw(instructions) => instructions.len(),
            Self::Prebuilt(tx) => tx.instruction_count(),
        }
    }

    pub fn is_prebuilt(&self) -> bool {
        matches!(self, Self::Prebuilt(_))
    }
}

/// A transaction object produced upstream, in the container matching its format
#[derive(Debug, Clone)]
pub enum PrebuiltTransaction {
    Legacy(Transaction),
    Versioned(VersionedTransaction),
}

impl PrebuiltTransaction {
    /// Decode a base64 wire transaction, e.g. from a swap API response
    ///
    /// The container type is chosen by `format`, never by sniffing the bytes.
    pub fn from_base64(encoded: &str, format: TransactionFormat) -> AssemblyResult<Self> {
        let bytes = BASE64_STANDARD.decode(encoded).map_err(|e| {
            AssemblyError::invalid_instructions(format!("transaction is not valid base64: {}", e))
        })?;

        match format {
            TransactionFormat::Legacy => bincode::deserialize::<Transaction>(&bytes)
                .map(Self::Legacy)
                .map_err(|e| {
                    AssemblyError::invalid_instructions(format!(
                        "failed to decode legacy transaction: {}",
                        e
                    ))
                }),
            TransactionFormat::Versioned => bincode::deserialize::<VersionedTransaction>(&bytes)
                .map(Self::Versioned)
                .map_err(|e| {
                    AssemblyError::invalid_instructions(format!(
                        "failed to decode versioned transaction: {}",
                        e
                    ))
                }),
        }
    }

    pub fn instruction_count(&self) -> usize {
        match self {
            Self::Legacy(tx) => tx.message.instructions.len(),
            Self::Versioned(tx) => tx.message.instructions().len(),
        }
    }

    pub fn signature_count(&self) -> usize {
        match self {
            Self::Legacy(tx) => tx.signatures.len(),
            Self::Versioned(tx) => tx.signatures.len(),
        }
    }
}

/// Position of the tip instruction relative to the SDK instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipPlacement {
    #[default]
    Prepend,
    Append,
}

/// A resolved tip: who pays, which account receives, how much, and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipPlan {
    pub payer: Pubkey,
    pub tip_account: Pubkey,
    pub lamports: u64,
    pub placement: TipPlacement,
}

impl TipPlan {
    /// Build the value-transfer instruction to the relay tip account
    pub fn instruction(&self) -> Instruction {
        system_instruction::transfer(&self.payer, &self.tip_account, self.lamports)
    }
}

/// Merge an optional tip into an instruction source
///
/// With no tip the source is returned untouched. With a tip, a `Raw` list gets
/// the transfer at the configured end; a `Prebuilt` source is rejected.
pub fn merge_tip(
    source: InstructionSource,
    tip: Option<&TipPlan>,
) -> AssemblyResult<InstructionSource> {
    let Some(tip) = tip else {
        return Ok(source);
    };

    match source {
        InstructionSource::Raw(mut instructions) => {
            let tip_ix = tip.instruction();
            match tip.placement {
                TipPlacement::Prepend => instructions.insert(0, tip_ix),
                TipPlacement::Append => instructions.push(tip_ix),
            }
            Ok(InstructionSource::Raw(instructions))
        }
        InstructionSource::Prebuilt(_) => Err(AssemblyError::invalid_instructions(
            "cannot merge a tip into a pre-built transaction",
        )),
    }
}

/// Validate a raw instruction list before compiling it
///
/// Rejects an empty list and instructions whose account list cannot be
/// indexed by a single-byte account index.
pub fn validate_instructions(instructions: &[Instruction]) -> AssemblyResult<()> {
    if instructions.is_empty() {
        return Err(AssemblyError::invalid_instructions("instruction list is empty"));
    }

    for (idx, ix) in instructions.iter().enumerate() {
        if ix.accounts.len() > u8::MAX as usize {
            return Err(AssemblyError::invalid_instructions(format!(
                "instruction {} references {} accounts (max {})",
                idx,
                ix.accounts.len(),
                u8::MAX
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{hash::Hash, instruction::AccountMeta, message::Message, system_program};

    fn program_ix(tag: u8) -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[tag],
            vec![AccountMeta::new(Pubkey::new_unique(), false)],
        )
    }

    fn tip(placement: TipPlacement) -> TipPlan {
        TipPlan {
            payer: Pubkey::new_unique(),
            tip_account: Pubkey::new_unique(),
            lamports: 1_000,
            placement,
        }
    }

    #[test]
    fn test_merge_without_tip_is_identity() {
        let ixs = vec![program_ix(1), program_ix(2)];
        let merged = merge_tip(InstructionSource::Raw(ixs.clone()), None).unwrap();
        match merged {
            InstructionSource::Raw(out) => assert_eq!(out, ixs),
            _ => panic!("Expected Raw source"),
        }
    }

    #[test]
    fn test_merge_prepends_tip() {
        let ixs = vec![program_ix(1), program_ix(2)];
        let plan = tip(TipPlacement::Prepend);
        let merged = merge_tip(InstructionSource::Raw(ixs.clone()), Some(&plan)).unwrap();

        let InstructionSource::Raw(out) = merged else {
            panic!("Expected Raw source");
        };
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].program_id, system_program::id());
        assert_eq!(out[0].accounts[1].pubkey, plan.tip_account);
        assert_eq!(&out[1..], &ixs[..]);
    }

    #[test]
    fn test_merge_appends_tip() {
        let ixs = vec![program_ix(1), program_ix(2)];
        let plan = tip(TipPlacement::Append);
        let merged = merge_tip(InstructionSource::Raw(ixs.clone()), Some(&plan)).unwrap();

        let InstructionSource::Raw(out) = merged else {
            panic!("Expected Raw source");
        };
        assert_eq!(&out[..2], &ixs[..]);
        assert_eq!(out[2], plan.instruction());
    }

    #[test]
    fn test_merge_rejects_prebuilt() {
        let payer = Pubkey::new_unique();
        let message = Message::new_with_blockhash(&[program_ix(1)], Some(&payer), &Hash::default());
        let source =
            InstructionSource::Prebuilt(PrebuiltTransaction::Legacy(Transaction::new_unsigned(message)));

        let result = merge_tip(source, Some(&tip(TipPlacement::Prepend)));
        assert!(matches!(result, Err(AssemblyError::InvalidInstructionSet(_))));
    }

    #[test]
    fn test_tip_instruction_is_system_transfer() {
        let plan = tip(TipPlacement::Prepend);
        let ix = plan.instruction();
        assert_eq!(ix.program_id, system_program::id());
        assert_eq!(ix.accounts[0].pubkey, plan.payer);
        assert!(ix.accounts[0].is_signer);
        // Transfer discriminator 2, then lamports little-endian
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(&ix.data[4..], &1_000u64.to_le_bytes());
    }

    #[test]
    fn test_validate_rejects_empty() {
        let result = validate_instructions(&[]);
        if let Err(AssemblyError::InvalidInstructionSet(msg)) = result {
            assert!(msg.contains("empty"));
        } else {
            panic!("Expected InvalidInstructionSet error");
        }
    }

    #[test]
    fn test_validate_accepts_program_instructions() {
        assert!(validate_instructions(&[program_ix(1), program_ix(2)]).is_ok());
    }

    #[test]
    fn test_prebuilt_from_base64_legacy() {
        let payer = Pubkey::new_unique();
        let message = Message::new_with_blockhash(
            &[program_ix(7), program_ix(8)],
            Some(&payer),
            &Hash::new_unique(),
        );
        let tx = Transaction::new_unsigned(message);
        let encoded = BASE64_STANDARD.encode(bincode::serialize(&tx).unwrap());

        let prebuilt = PrebuiltTransaction::from_base64(&encoded, TransactionFormat::Legacy).unwrap();
        assert!(matches!(prebuilt, PrebuiltTransaction::Legacy(_)));
        assert_eq!(prebuilt.instruction_count(), 2);
        assert_eq!(prebuilt.signature_count(), 1);
    }

    #[test]
    fn test_prebuilt_from_base64_rejects_garbage() {
        let result = PrebuiltTransaction::from_base64("not base64!!", TransactionFormat::Versioned);
        assert!(matches!(result, Err(AssemblyError::InvalidInstructionSet(_))));

        let result = PrebuiltTransaction::from_base64("AAAA", TransactionFormat::Versioned);
        assert!(matches!(result, Err(AssemblyError::InvalidInstructionSet(_))));
    }
}
