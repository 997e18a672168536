use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Error outputs from the Action Codes protocol.
///
/// Every variant maps to a stable [`ErrorCode`] and exposes its structured fields through
/// [`ProtocolError::details`], so errors can be propagated across process or language boundaries
/// without parsing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum ProtocolError {
    /// The action code is past its expiry, including the allowed clock skew.
    #[error("action code expired at {expires_at} (now {now}, allowed skew {clock_skew_ms}ms)")]
    ExpiredCode {
        /// Expiry of the code or certificate, in milliseconds.
        expires_at: u64,
        /// Wall clock at validation time, in milliseconds.
        now: u64,
        /// Tolerated clock skew, in milliseconds.
        clock_skew_ms: u64,
    },
    /// The action code is structurally valid but not acceptable.
    #[error("invalid action code: {reason}")]
    InvalidCode {
        /// Why the code was rejected.
        reason: String,
        /// The field that failed the check, if a single one can be named.
        field: Option<String>,
    },
    /// The code does not have the expected shape or does not match its derivation.
    #[error("invalid action code format: {reason}")]
    InvalidCodeFormat {
        /// Why the code was rejected.
        reason: String,
    },
    /// A signature is missing, malformed or does not verify.
    #[error("invalid signature: {reason}")]
    InvalidSignature {
        /// Why the signature was rejected.
        reason: String,
    },
    /// No protocol meta was supplied.
    #[error("missing protocol meta")]
    MissingMeta,
    /// The protocol meta string violates the wire schema.
    #[error("invalid protocol meta format: {reason}")]
    InvalidMetaFormat {
        /// Why the meta was rejected.
        reason: String,
    },
    /// The protocol meta is well formed but does not match what was expected.
    #[error("protocol meta mismatch on `{field}`")]
    MetaMismatch {
        /// The meta field that differs.
        field: String,
        /// Expected value.
        expected: String,
        /// Value found in the meta.
        actual: String,
    },
    /// A protocol meta field or the complete meta string exceeds the size guard.
    #[error("protocol meta `{field}` too large: {actual} bytes exceeds {max}")]
    MetaTooLarge {
        /// The oversized field (`meta` for the complete string).
        field: String,
        /// Maximum size in bytes.
        max: u64,
        /// Actual size in bytes.
        actual: u64,
    },
    /// The external transaction is not signed by the pubkey named in the meta.
    #[error("transaction not signed by intended owner {intended}")]
    TransactionNotSignedByIntendedOwner {
        /// Pubkey the transaction was expected to be signed by.
        intended: String,
        /// Signers actually present on the transaction.
        signers: Vec<String>,
    },
    /// The external transaction could not be decoded.
    #[error("invalid transaction format: {reason}")]
    InvalidTransactionFormat {
        /// Why the transaction was rejected.
        reason: String,
    },
    /// A public key could not be decoded for the chain in question.
    #[error("invalid pubkey format: {reason}")]
    InvalidPubkeyFormat {
        /// Why the pubkey was rejected.
        reason: String,
    },
    /// The presented input is not valid for the requested operation.
    #[error("invalid input on {attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid.
        attribute: String,
        /// The reason the input is invalid.
        reason: String,
    },
    /// A field required by the operation is missing or empty.
    #[error("missing required field `{field}`")]
    MissingRequiredField {
        /// Name of the missing field.
        field: String,
    },
    /// Unexpected failure of a cryptographic primitive.
    #[error("crypto error: {reason}")]
    CryptoError {
        /// Details of the failure.
        reason: String,
    },
    /// A digest is unusable for code derivation.
    #[error("invalid digest: {reason}")]
    InvalidDigest {
        /// Why the digest was rejected.
        reason: String,
    },
    /// No usable chain adapter is available.
    #[error("invalid adapter for chain `{chain}`: {reason}")]
    InvalidAdapter {
        /// Chain identifier that was looked up.
        chain: String,
        /// Why the adapter could not be used.
        reason: String,
    },
}

/// Stable, language-independent identifier of a [`ProtocolError`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ErrorCode {
    ExpiredCode,
    InvalidCode,
    InvalidCodeFormat,
    InvalidSignature,
    MissingMeta,
    InvalidMetaFormat,
    MetaMismatch,
    MetaTooLarge,
    TransactionNotSignedByIntendedOwner,
    InvalidTransactionFormat,
    InvalidPubkeyFormat,
    InvalidInput,
    MissingRequiredField,
    CryptoError,
    InvalidDigest,
    InvalidAdapter,
}

/// Taxonomy group of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Expiry, derivation and signature checks on action codes.
    CodeValidation,
    /// Protocol meta wire format checks.
    MetaValidation,
    /// Binding between a code and an external transaction. Raised by chain adapters.
    TransactionBinding,
    /// Caller supplied input.
    Input,
    /// Hashing and digest handling.
    Crypto,
    /// Chain adapter registry.
    Adapter,
}

impl ErrorCode {
    /// Returns the taxonomy group this code belongs to.
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::ExpiredCode
            | Self::InvalidCode
            | Self::InvalidCodeFormat
            | Self::InvalidSignature => ErrorCategory::CodeValidation,
            Self::MissingMeta
            | Self::InvalidMetaFormat
            | Self::MetaMismatch
            | Self::MetaTooLarge => ErrorCategory::MetaValidation,
            Self::TransactionNotSignedByIntendedOwner
            | Self::InvalidTransactionFormat
            | Self::InvalidPubkeyFormat => ErrorCategory::TransactionBinding,
            Self::InvalidInput | Self::MissingRequiredField => ErrorCategory::Input,
            Self::CryptoError | Self::InvalidDigest => ErrorCategory::Crypto,
            Self::InvalidAdapter => ErrorCategory::Adapter,
        }
    }
}

/// Serializable snapshot of a [`ProtocolError`] for cross-process propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human readable message.
    pub message: String,
    /// Structured details, e.g. expected/actual values for mismatches.
    pub details: BTreeMap<String, String>,
}

impl ProtocolError {
    /// Returns the stable code of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ExpiredCode { .. } => ErrorCode::ExpiredCode,
            Self::InvalidCode { .. } => ErrorCode::InvalidCode,
            Self::InvalidCodeFormat { .. } => ErrorCode::InvalidCodeFormat,
            Self::InvalidSignature { .. } => ErrorCode::InvalidSignature,
            Self::MissingMeta => ErrorCode::MissingMeta,
            Self::InvalidMetaFormat { .. } => ErrorCode::InvalidMetaFormat,
            Self::MetaMismatch { .. } => ErrorCode::MetaMismatch,
            Self::MetaTooLarge { .. } => ErrorCode::MetaTooLarge,
            Self::TransactionNotSignedByIntendedOwner { .. } => {
                ErrorCode::TransactionNotSignedByIntendedOwner
            }
            Self::InvalidTransactionFormat { .. } => ErrorCode::InvalidTransactionFormat,
            Self::InvalidPubkeyFormat { .. } => ErrorCode::InvalidPubkeyFormat,
            Self::InvalidInput { .. } => ErrorCode::InvalidInput,
            Self::MissingRequiredField { .. } => ErrorCode::MissingRequiredField,
            Self::CryptoError { .. } => ErrorCode::CryptoError,
            Self::InvalidDigest { .. } => ErrorCode::InvalidDigest,
            Self::InvalidAdapter { .. } => ErrorCode::InvalidAdapter,
        }
    }

    /// Returns the structured fields of this error as a string map.
    #[must_use]
    pub fn details(&self) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            details.insert(key.to_string(), value);
        };
        match self {
            Self::ExpiredCode {
                expires_at,
                now,
                clock_skew_ms,
            } => {
                put("expiresAt", expires_at.to_string());
                put("now", now.to_string());
                put("clockSkewMs", clock_skew_ms.to_string());
            }
            Self::InvalidCode { reason, field } => {
                put("reason", reason.clone());
                if let Some(field) = field {
                    put("field", field.clone());
                }
            }
            Self::InvalidCodeFormat { reason }
            | Self::InvalidSignature { reason }
            | Self::InvalidMetaFormat { reason }
            | Self::InvalidTransactionFormat { reason }
            | Self::InvalidPubkeyFormat { reason }
            | Self::CryptoError { reason }
            | Self::InvalidDigest { reason } => put("reason", reason.clone()),
            Self::MissingMeta => {}
            Self::MetaMismatch {
                field,
                expected,
                actual,
            } => {
                put("field", field.clone());
                put("expected", expected.clone());
                put("actual", actual.clone());
            }
            Self::MetaTooLarge { field, max, actual } => {
                put("field", field.clone());
                put("max", max.to_string());
                put("actual", actual.to_string());
            }
            Self::TransactionNotSignedByIntendedOwner { intended, signers } => {
                put("intended", intended.clone());
                put("signers", signers.join(","));
            }
            Self::InvalidInput { attribute, reason } => {
                put("attribute", attribute.clone());
                put("reason", reason.clone());
            }
            Self::MissingRequiredField { field } => put("field", field.clone()),
            Self::InvalidAdapter { chain, reason } => {
                put("chain", chain.clone());
                put("reason", reason.clone());
            }
        }
        details
    }

    /// Builds the serializable report of this error.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    pub(crate) fn invalid_input(attribute: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_field(field: &str) -> Self {
        Self::MissingRequiredField {
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid_meta(reason: impl Into<String>) -> Self {
        Self::InvalidMetaFormat {
            reason: reason.into(),
        }
    }
}
