//! Property-based tests for assembly and payload laws
//!
//! - decode(serialize(assemble(I, F), F), F) == I for both formats
//! - serializing with the other format always fails
//! - signature slots: absent for <= 1 signer, slot 0 always null
//! - push mode is manual iff the alternate relay is used

use proptest::prelude::*;
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use vault_tx::tx_builder::{
    assemble, resolve_signature_slots, serialize_message, AssemblyError, InstructionSource,
    PushMode, SerializedMessage, SigningRequestPayload, TransactionFormat,
};

/// Per instruction: account flags (signer, writable) and data
type InstructionShape = (Vec<(bool, bool)>, Vec<u8>);

fn instruction_shapes() -> impl Strategy<Value = Vec<InstructionShape>> {
    prop::collection::vec(
        (
            prop::collection::vec((any::<bool>(), any::<bool>()), 0..5),
            prop::collection::vec(any::<u8>(), 0..32),
        ),
        1..6,
    )
}

fn format_strategy() -> impl Strategy<Value = TransactionFormat> {
    prop_oneof![Just(TransactionFormat::Legacy), Just(TransactionFormat::Versioned)]
}

fn other(format: TransactionFormat) -> TransactionFormat {
    match format {
        TransactionFormat::Legacy => TransactionFormat::Versioned,
        TransactionFormat::Versioned => TransactionFormat::Legacy,
    }
}

/// Fresh keys everywhere so every account has one consistent set of flags
fn materialize(shapes: &[InstructionShape]) -> Vec<Instruction> {
    shapes
        .iter()
        .map(|(accounts, data)| {
            let metas = accounts
                .iter()
                .map(|&(is_signer, is_writable)| AccountMeta {
                    pubkey: Pubkey::new_unique(),
                    is_signer,
                    is_writable,
                })
                .collect();
            Instruction::new_with_bytes(Pubkey::new_unique(), data, metas)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_round_trip_preserves_instructions(
        shapes in instruction_shapes(),
        format in format_strategy(),
    ) {
        let payer = Pubkey::new_unique();
        let instructions = materialize(&shapes);

        let tx = assemble(&payer, Hash::new_unique(), InstructionSource::Raw(instructions.clone()), format).unwrap();
        let encoded = serialize_message(&tx, format).unwrap();
        let decoded = encoded.decode_instructions(format).unwrap();

        prop_assert_eq!(decoded, instructions);
    }

    #[test]
    fn prop_cross_format_serialization_fails(
        shapes in instruction_shapes(),
        format in format_strategy(),
    ) {
        let payer = Pubkey::new_unique();
        let tx = assemble(&payer, Hash::new_unique(), InstructionSource::Raw(materialize(&shapes)), format).unwrap();

        let result = serialize_message(&tx, other(format));
        let is_mismatch = matches!(result, Err(AssemblyError::FormatMismatch { .. }));
        prop_assert!(is_mismatch);
    }

    #[test]
    fn prop_signature_slots_shape(
        slots in prop::collection::vec(prop::option::of(prop::collection::vec(any::<u8>(), 1..64)), 0..6),
    ) {
        let raw: Vec<Option<&[u8]>> = slots.iter().map(|s| s.as_deref()).collect();
        let resolved = resolve_signature_slots(&raw);

        if slots.len() <= 1 {
            prop_assert!(resolved.is_none());
        } else {
            let resolved = resolved.unwrap();
            prop_assert_eq!(resolved.len(), slots.len());
            prop_assert!(resolved[0].data.is_none());
            for (slot, original) in resolved.iter().zip(slots.iter()).skip(1) {
                prop_assert_eq!(slot.data.is_some(), original.is_some());
            }
        }
    }

    #[test]
    fn prop_push_mode_follows_relay(use_alternate_relay in any::<bool>()) {
        let payload = SigningRequestPayload::new(
            "vault",
            SerializedMessage::from("AQID".to_string()),
            use_alternate_relay,
            "solana_mainnet",
            None,
        );
        let expected = if use_alternate_relay { PushMode::Manual } else { PushMode::Auto };
        prop_assert_eq!(payload.push_mode(), expected);

        let json = serde_json::to_value(&payload).unwrap();
        let push_mode = if use_alternate_relay { "manual" } else { "auto" };
        prop_assert_eq!(json["details"]["push_mode"].as_str(), Some(push_mode));
    }
}
