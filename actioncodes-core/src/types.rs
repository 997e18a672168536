//! Data model shared by the codecs, the strategies and the chain adapters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::code_hash;

/// A short-lived decimal code bound to a signature over one canonical message.
///
/// Produced by a strategy and never mutated afterwards. `code` is always recomputed on
/// validation from the other fields, so a tampered code never validates.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct ActionCode {
    /// Decimal digits, 6 to 24 characters.
    pub code: String,
    /// Pubkey the code was issued for.
    pub pubkey: String,
    /// Start of the window the code belongs to, in milliseconds.
    pub timestamp: u64,
    /// `timestamp + ttl_ms`.
    pub expires_at: u64,
    /// Signature over the canonical message the code was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Optional keying secret mixed into the canonical message and the digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Non-reversible fingerprint of `secret`, safe to display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_hint: Option<String>,
}

impl ActionCode {
    /// Start of the window this code belongs to.
    #[must_use]
    pub const fn window_start(&self) -> u64 {
        self.timestamp
    }

    /// Hex SHA-256 of the code. Use this wherever the raw code must not appear.
    #[must_use]
    pub fn code_hash(&self) -> String {
        code_hash(&self.code)
    }

    /// Whether the code is past `expires_at + clock_skew_ms` at `now_ms`.
    #[must_use]
    pub const fn is_expired_at(&self, now_ms: u64, clock_skew_ms: u64) -> bool {
        now_ms > self.expires_at.saturating_add(clock_skew_ms)
    }

    /// Milliseconds left until `expires_at`, zero once expired.
    #[must_use]
    pub const fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }
}

impl fmt::Debug for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCode")
            .field("code", &self.code)
            .field("pubkey", &self.pubkey)
            .field("timestamp", &self.timestamp)
            .field("expires_at", &self.expires_at)
            .field("signature", &self.signature)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("secret_hint", &self.secret_hint)
            .finish()
    }
}

/// Inputs of the canonical generation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMessageParts {
    /// Pubkey the code is issued for.
    pub pubkey: String,
    /// Window start in milliseconds.
    pub window_start: u64,
    /// Optional keying secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl CanonicalMessageParts {
    /// Creates parts without a secret.
    #[must_use]
    pub fn new(pubkey: impl Into<String>, window_start: u64) -> Self {
        Self {
            pubkey: pubkey.into(),
            window_start,
            secret: None,
        }
    }

    /// Parts from which `action_code` must have been derived.
    #[must_use]
    pub fn from_action_code(action_code: &ActionCode) -> Self {
        Self {
            pubkey: action_code.pubkey.clone(),
            window_start: action_code.timestamp,
            secret: action_code.secret.clone(),
        }
    }
}

/// Inputs of the canonical revoke message.
///
/// Serialized under a different protocol id than [`CanonicalMessageParts`] so a generation
/// signature can never be replayed as a revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRevokeMessageParts {
    /// Pubkey that owns the code being revoked.
    pub pubkey: String,
    /// Hash of the code being revoked.
    pub code_hash: String,
    /// Window start of the code being revoked.
    pub window_start: u64,
}

/// A time-bounded authorization letting `delegated_pubkey` mint codes for `delegator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct DelegationCertificate {
    /// Certificate format version. Always `"1.0"`.
    pub version: String,
    /// Wallet granting the authority.
    pub delegator: String,
    /// Key receiving the authority.
    pub delegated_pubkey: String,
    /// Issue time in milliseconds.
    pub issued_at: u64,
    /// Expiry in milliseconds.
    pub expires_at: u64,
    /// Random hex nonce making every certificate unique.
    pub nonce: String,
    /// Chain whose adapter verifies `signature`.
    pub chain: String,
    /// Delegator's signature over the certificate bytes without this field. Empty until signed.
    #[serde(default)]
    pub signature: String,
}

impl DelegationCertificate {
    /// Returns a copy carrying `signature`.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Whether a signature has been attached.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.signature.trim().is_empty()
    }
}

/// An action code minted by a delegate on behalf of the certificate's delegator.
///
/// `action_code.pubkey` is the delegator. The code is committed to its certificate through
/// `certificate_hash`; the full certificate travels along so verifiers can re-check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct DelegatedActionCode {
    /// The code, re-labelled with the delegator's pubkey.
    #[serde(flatten)]
    pub action_code: ActionCode,
    /// Key that signed the canonical message.
    pub delegated_pubkey: String,
    /// The delegate's signature over the canonical message.
    pub delegated_signature: String,
    /// Hash of the certificate the code was minted under.
    pub certificate_hash: String,
    /// The certificate the code was minted under.
    pub certificate: DelegationCertificate,
}

impl DelegatedActionCode {
    /// The delegator the action is performed for.
    #[must_use]
    pub fn delegator(&self) -> &str {
        &self.action_code.pubkey
    }
}
