//! Signing-service request payload
//!
//! A pure transform: serialized message + vault + relay policy in, a request
//! object out. Nothing here touches the network.

use crate::tx_builder::errors::{AssemblyError, AssemblyResult};
use crate::tx_builder::serializer::SerializedMessage;
use crate::tx_builder::signatures::SignatureSlot;
use serde::{Deserialize, Serialize};

pub const SIGNER_TYPE_API_SIGNER: &str = "api_signer";
pub const SIGN_MODE_AUTO: &str = "auto";
pub const TRANSACTION_TYPE_SOLANA: &str = "solana_transaction";
pub const DETAILS_TYPE_SERIALIZED_MESSAGE: &str = "solana_serialized_transaction_message";
pub const CHAIN_SOLANA_MAINNET: &str = "solana_mainnet";
/// Only meaningful for the synchronous create-and-wait endpoint
pub const WAIT_FOR_STATE_SIGNED: &str = "signed";

/// Who broadcasts the signed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    /// The signing service broadcasts
    Auto,
    /// The caller relays the signed transaction itself
    Manual,
}

impl PushMode {
    pub fn for_relay(use_alternate_relay: bool) -> Self {
        if use_alternate_relay {
            Self::Manual
        } else {
            Self::Auto
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetails {
    #[serde(rename = "type")]
    pub details_type: String,
    pub push_mode: PushMode,
    pub data: SerializedMessage,
    pub chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<SignatureSlot>>,
}

/// The request object handed to the external signing client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequestPayload {
    pub vault_id: String,
    pub signer_type: String,
    pub sign_mode: String,
    #[serde(rename = "type")]
    pub request_type: String,
    pub details: RequestDetails,
    pub wait_for_state: String,
}

impl SigningRequestPayload {
    /// Compose the request from already-resolved parts
    pub fn new(
        vault_id: impl Into<String>,
        data: SerializedMessage,
        use_alternate_relay: bool,
        chain: impl Into<String>,
        signatures: Option<Vec<SignatureSlot>>,
    ) -> Self {
        Self {
            vault_id: vault_id.into(),
            signer_type: SIGNER_TYPE_API_SIGNER.to_string(),
            sign_mode: SIGN_MODE_AUTO.to_string(),
            request_type: TRANSACTION_TYPE_SOLANA.to_string(),
            details: RequestDetails {
                details_type: DETAILS_TYPE_SERIALIZED_MESSAGE.to_string(),
                push_mode: PushMode::for_relay(use_alternate_relay),
                data,
                chain: chain.into(),
                signatures,
            },
            wait_for_state: WAIT_FOR_STATE_SIGNED.to_string(),
        }
    }

    pub fn push_mode(&self) -> PushMode {
        self.details.push_mode
    }

    /// JSON text of the request body
    pub fn to_request_body(&self) -> AssemblyResult<String> {
        serde_json::to_string(self).map_err(|e| AssemblyError::Serialization(e.to_string()))
    }
}

/// A request body plus the string the external authenticator signs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub endpoint: String,
    pub timestamp_ms: i64,
    pub body: String,
}

impl PreparedRequest {
    pub fn new(
        endpoint: impl Into<String>,
        timestamp_ms: i64,
        payload: &SigningRequestPayload,
    ) -> AssemblyResult<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            timestamp_ms,
            body: payload.to_request_body()?,
        })
    }

    /// Stamp with the current wall-clock time
    pub fn now(endpoint: impl Into<String>, payload: &SigningRequestPayload) -> AssemblyResult<Self> {
        Self::new(endpoint, chrono::Utc::now().timestamp_millis(), payload)
    }

    /// `{endpoint}|{timestamp}|{body}`
    pub fn authentication_message(&self) -> String {
        format!("{}|{}|{}", self.endpoint, self.timestamp_ms, self.body)
    }
}
