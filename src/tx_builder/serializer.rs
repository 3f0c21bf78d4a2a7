//! Message serialization for the signing service
//!
//! Only the message is ever encoded, never a full transaction: the signer
//! expects the bare bytes it will sign, without signature slots or padding.

use crate::tx_builder::assembler::AssembledTransaction;
use crate::tx_builder::errors::{AssemblyError, AssemblyResult};
use crate::tx_builder::format::TransactionFormat;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    message::{MessageHeader, VersionedMessage},
};
use std::fmt;

/// Base64 of a message's canonical encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedMessage(String);

impl SerializedMessage {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self(BASE64_STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> AssemblyResult<Vec<u8>> {
        BASE64_STANDARD.decode(&self.0).map_err(|e| {
            AssemblyError::invalid_instructions(format!("serialized message is not base64: {}", e))
        })
    }

    /// Decode back into a message, checking it is of `format`
    pub fn decode_message(&self, format: TransactionFormat) -> AssemblyResult<VersionedMessage> {
        let bytes = self.to_bytes()?;
        let message: VersionedMessage = bincode::deserialize(&bytes).map_err(|e| {
            AssemblyError::invalid_instructions(format!("failed to decode message: {}", e))
        })?;

        let actual = match message {
            VersionedMessage::Legacy(_) => TransactionFormat::Legacy,
            VersionedMessage::V0(_) => TransactionFormat::Versioned,
        };
        if actual != format {
            return Err(AssemblyError::format_mismatch(format, actual));
        }
        Ok(message)
    }

    /// Decompile the encoded message into its instruction sequence
    ///
    /// Signer and writable flags come from the message header. Messages that
    /// load accounts from lookup tables are rejected, since the tables are not
    /// part of the message.
    pub fn decode_instructions(&self, format: TransactionFormat) -> AssemblyResult<Vec<Instruction>> {
        let message = self.decode_message(format)?;

        if let VersionedMessage::V0(v0) = &message {
            if !v0.address_table_lookups.is_empty() {
                return Err(AssemblyError::invalid_instructions(
                    "message loads accounts from address lookup tables",
                ));
            }
        }

        let header = message.header();
        let keys = message.static_account_keys();
        let key_at = |index: u8| {
            keys.get(index as usize).copied().ok_or_else(|| {
                AssemblyError::invalid_instructions(format!(
                    "account index {} out of range ({} keys)",
                    index,
                    keys.len()
                ))
            })
        };

        message
            .instructions()
            .iter()
            .map(|compiled| {
                let program_id = key_at(compiled.program_id_index)?;
                let accounts = compiled
                    .accounts
                    .iter()
                    .map(|&index| {
                        Ok(AccountMeta {
                            pubkey: key_at(index)?,
                            is_signer: (index as usize) < header.num_required_signatures as usize,
                            is_writable: is_writable_index(header, keys.len(), index as usize),
                        })
                    })
                    .collect::<AssemblyResult<Vec<_>>>()?;
                Ok(Instruction {
                    program_id,
                    accounts,
                    data: compiled.data.clone(),
                })
            })
            .collect()
    }
}

impl From<String> for SerializedMessage {
    fn from(encoded: String) -> Self {
        Self(encoded)
    }
}

impl fmt::Display for SerializedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_writable_index(header: &MessageHeader, num_keys: usize, index: usize) -> bool {
    let num_signed = header.num_required_signatures as usize;
    if index < num_signed {
        index < num_signed.saturating_sub(header.num_readonly_signed_accounts as usize)
    } else {
        let num_unsigned = num_keys.saturating_sub(num_signed);
        index - num_signed < num_unsigned.saturating_sub(header.num_readonly_unsigned_accounts as usize)
    }
}

/// Serialize the message of `tx` for signing
///
/// # Errors
///
/// `FormatMismatch` if `tx` holds a message of the other format. No bytes are
/// produced in that case.
pub fn serialize_message(
    tx: &AssembledTransaction,
    format: TransactionFormat,
) -> AssemblyResult<SerializedMessage> {
    match (format, tx) {
        (TransactionFormat::Legacy, AssembledTransaction::Legacy(legacy)) => {
            Ok(SerializedMessage::from_bytes(&legacy.message_data()))
        }
        (TransactionFormat::Versioned, AssembledTransaction::Versioned(versioned))
            if matches!(versioned.message, VersionedMessage::V0(_)) =>
        {
            Ok(SerializedMessage::from_bytes(&versioned.message.serialize()))
        }
        _ => Err(AssemblyError::format_mismatch(format, tx.format())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::assembler::assemble;
    use crate::tx_builder::instructions::InstructionSource;
    use solana_sdk::{hash::Hash, message::Message, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};
    use std::str::FromStr;
    #[allow(deprecated)]
    use solana_sdk::system_instruction;

    fn sample_instructions(payer: &Pubkey) -> Vec<Instruction> {
        vec![
            system_instruction::transfer(payer, &Pubkey::new_unique(), 5_000),
            Instruction::new_with_bytes(
                Pubkey::new_unique(),
                &[7, 7, 7],
                vec![
                    AccountMeta::new(Pubkey::new_unique(), false),
                    AccountMeta::new_readonly(Pubkey::new_unique(), false),
                ],
            ),
        ]
    }

    #[test]
    fn test_legacy_transfer_scenario() {
        let payer = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let blockhash = Hash::from_str("11111111111111111111111111111111").unwrap();
        let ix = system_instruction::transfer(&payer, &recipient, 1_000);

        let tx = assemble(&payer, blockhash, InstructionSource::Raw(vec![ix.clone()]), TransactionFormat::Legacy)
            .unwrap();
        let first = serialize_message(&tx, TransactionFormat::Legacy).unwrap();
        let second = serialize_message(&tx, TransactionFormat::Legacy).unwrap();
        assert_eq!(first, second);

        let decoded = first.decode_instructions(TransactionFormat::Legacy).unwrap();
        assert_eq!(decoded, vec![ix]);
        assert_eq!(&decoded[0].data[4..], &1_000u64.to_le_bytes());
    }

    #[test]
    fn test_round_trip_both_formats() {
        let payer = Pubkey::new_unique();
        let ixs = sample_instructions(&payer);
        for format in [TransactionFormat::Legacy, TransactionFormat::Versioned] {
            let tx = assemble(&payer, Hash::new_unique(), InstructionSource::Raw(ixs.clone()), format).unwrap();
            let serialized = serialize_message(&tx, format).unwrap();
            assert_eq!(serialized.decode_instructions(format).unwrap(), ixs);
        }
    }

    #[test]
    fn test_legacy_bytes_exclude_signatures() {
        let payer = Pubkey::new_unique();
        let tx = assemble(&payer, Hash::new_unique(), InstructionSource::Raw(sample_instructions(&payer)), TransactionFormat::Legacy)
            .unwrap();
        let AssembledTransaction::Legacy(legacy) = &tx else {
            panic!("Expected legacy container");
        };

        let bytes = serialize_message(&tx, TransactionFormat::Legacy).unwrap().to_bytes().unwrap();
        assert_eq!(bytes, legacy.message.serialize());
        assert!(bytes.len() < bincode::serialize(legacy).unwrap().len());
    }

    #[test]
    fn test_versioned_bytes_carry_version_prefix() {
        let payer = Pubkey::new_unique();
        let tx = assemble(&payer, Hash::new_unique(), InstructionSource::Raw(sample_instructions(&payer)), TransactionFormat::Versioned)
            .unwrap();
        let bytes = serialize_message(&tx, TransactionFormat::Versioned).unwrap().to_bytes().unwrap();
        assert_eq!(bytes[0], 0x80);
    }

    #[test]
    fn test_cross_application_fails() {
        let payer = Pubkey::new_unique();
        let ixs = sample_instructions(&payer);

        let legacy = assemble(&payer, Hash::new_unique(), InstructionSource::Raw(ixs.clone()), TransactionFormat::Legacy).unwrap();
        assert!(matches!(
            serialize_message(&legacy, TransactionFormat::Versioned),
            Err(AssemblyError::FormatMismatch {
                expected: TransactionFormat::Versioned,
                actual: TransactionFormat::Legacy,
            })
        ));

        let versioned = assemble(&payer, Hash::new_unique(), InstructionSource::Raw(ixs), TransactionFormat::Versioned).unwrap();
        assert!(matches!(
            serialize_message(&versioned, TransactionFormat::Legacy),
            Err(AssemblyError::FormatMismatch {
                expected: TransactionFormat::Legacy,
                actual: TransactionFormat::Versioned,
            })
        ));
    }

    #[test]
    fn test_versioned_container_with_legacy_message_is_mismatch() {
        let payer = Pubkey::new_unique();
        let message = Message::new_with_blockhash(&sample_instructions(&payer), Some(&payer), &Hash::new_unique());
        let tx = AssembledTransaction::Versioned(VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(message),
        });

        assert!(matches!(
            serialize_message(&tx, TransactionFormat::Versioned),
            Err(AssemblyError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_with_wrong_format_fails() {
        let payer = Pubkey::new_unique();
        let tx = assemble(&payer, Hash::new_unique(), InstructionSource::Raw(sample_instructions(&payer)), TransactionFormat::Versioned)
            .unwrap();
        let serialized = serialize_message(&tx, TransactionFormat::Versioned).unwrap();

        assert!(matches!(
            serialized.decode_instructions(TransactionFormat::Legacy),
            Err(AssemblyError::FormatMismatch { .. })
        ));
    }
}
