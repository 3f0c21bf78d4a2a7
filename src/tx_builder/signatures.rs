//! Signature-slot resolution for the multi-party custodial flow
//!
//! Slot 0 always belongs to the custodial vault and is sent as a `null`
//! placeholder, whatever the transaction holds there. Later slots carry
//! co-signatures the SDK attached (e.g. a freshly created position mint).
//!
//! Per-format rule for slots 1..n:
//! - versioned: every slot is encoded as-is
//! - legacy: a slot the co-signer has not signed yet (all-zero) is `null`

use crate::tx_builder::assembler::AssembledTransaction;
use crate::tx_builder::format::TransactionFormat;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;

/// One entry of the request's `signatures` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSlot {
    pub data: Option<String>,
}

impl SignatureSlot {
    pub fn placeholder() -> Self {
        Self { data: None }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: Some(BASE64_STANDARD.encode(bytes)),
        }
    }
}

/// Resolve request signature slots from raw per-slot signature bytes
///
/// `None` in `signatures` marks a slot whose signer has not signed. Returns
/// `None` when there is at most one slot, i.e. only the vault signs.
pub fn resolve_signature_slots(signatures: &[Option<&[u8]>]) -> Option<Vec<SignatureSlot>> {
    if signatures.len() <= 1 {
        return None;
    }

    let mut slots = Vec::with_capacity(signatures.len());
    slots.push(SignatureSlot::placeholder());
    slots.extend(signatures[1..].iter().map(|sig| match sig {
        Some(bytes) => SignatureSlot::from_bytes(bytes),
        None => SignatureSlot::placeholder(),
    }));
    Some(slots)
}

/// Resolve request signature slots from an assembled transaction
pub fn resolve_transaction_slots(tx: &AssembledTransaction) -> Option<Vec<SignatureSlot>> {
    let format = tx.format();
    let raw: Vec<Option<&[u8]>> = tx
        .signatures()
        .iter()
        .map(|sig| signature_bytes(sig, format))
        .collect();
    resolve_signature_slots(&raw)
}

fn signature_bytes(sig: &Signature, format: TransactionFormat) -> Option<&[u8]> {
    match format {
        TransactionFormat::Versioned => Some(sig.as_ref()),
        TransactionFormat::Legacy if *sig == Signature::default() => None,
        TransactionFormat::Legacy => Some(sig.as_ref()),
    }
}
