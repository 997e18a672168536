//! Canonical, signable byte encodings.
//!
//! These bytes are what wallets sign and what validators re-derive, so the encoding is frozen:
//! compact JSON, fixed key order, no whitespace. Identical logical input always yields identical
//! bytes.

use serde::{Deserialize, Serialize};

use crate::digest::sha256;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{CanonicalMessageParts, CanonicalRevokeMessageParts, DelegationCertificate};

/// Protocol id embedded in generation messages.
pub const PROTOCOL_ID: &str = "actioncodes";
/// Protocol id embedded in revoke messages.
pub const REVOKE_PROTOCOL_ID: &str = "actioncodes-revoke";
/// Version of the canonical message layout.
pub const CANONICAL_MESSAGE_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalMessage<'a> {
    id: &'a str,
    ver: u32,
    pubkey: &'a str,
    window_start: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ParsedCanonicalMessage {
    id: String,
    ver: u32,
    pubkey: String,
    window_start: u64,
    #[serde(default)]
    secret: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalRevokeMessage<'a> {
    id: &'a str,
    ver: u32,
    pubkey: &'a str,
    code_hash: &'a str,
    window_start: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CertificatePayload<'a> {
    version: &'a str,
    delegator: &'a str,
    delegated_pubkey: &'a str,
    issued_at: u64,
    expires_at: u64,
    nonce: &'a str,
    chain: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
}

impl<'a> CertificatePayload<'a> {
    fn new(certificate: &'a DelegationCertificate, signature: Option<&'a str>) -> Self {
        Self {
            version: &certificate.version,
            delegator: &certificate.delegator,
            delegated_pubkey: &certificate.delegated_pubkey,
            issued_at: certificate.issued_at,
            expires_at: certificate.expires_at,
            nonce: &certificate.nonce,
            chain: &certificate.chain,
            signature,
        }
    }
}

fn to_canonical_json<T: Serialize>(value: &T, attribute: &str) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ProtocolError::invalid_input(attribute, e.to_string()))
}

fn require_non_empty(value: &str, field: &str) -> ProtocolResult<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::missing_field(field));
    }
    Ok(())
}

/// Start of the window containing `now_ms`: `floor(now_ms / ttl_ms) * ttl_ms`.
///
/// # Errors
/// Returns `InvalidInput` if `ttl_ms` is zero.
pub fn window_start(now_ms: u64, ttl_ms: u64) -> ProtocolResult<u64> {
    if ttl_ms == 0 {
        return Err(ProtocolError::invalid_input(
            "ttl_ms",
            "window length must be greater than zero",
        ));
    }
    Ok(now_ms / ttl_ms * ttl_ms)
}

/// Serializes the generation message a wallet signs.
///
/// Layout: `{"id":"actioncodes","ver":1,"pubkey":..,"windowStart":..[,"secret":..]}`.
///
/// # Errors
/// Returns `MissingRequiredField` for an empty pubkey and `InvalidInput` for an empty secret.
pub fn serialize_canonical(parts: &CanonicalMessageParts) -> ProtocolResult<Vec<u8>> {
    require_non_empty(&parts.pubkey, "pubkey")?;
    if parts.secret.as_deref().is_some_and(str::is_empty) {
        return Err(ProtocolError::invalid_input(
            "secret",
            "secret must be omitted rather than empty",
        ));
    }
    to_canonical_json(
        &CanonicalMessage {
            id: PROTOCOL_ID,
            ver: CANONICAL_MESSAGE_VERSION,
            pubkey: &parts.pubkey,
            window_start: parts.window_start,
            secret: parts.secret.as_deref(),
        },
        "canonical_message",
    )
}

/// Parses bytes produced by [`serialize_canonical`].
///
/// Only the exact canonical form is accepted: re-serializing the result must reproduce the
/// input byte for byte.
///
/// # Errors
/// Returns `InvalidInput` if the bytes are not a canonical generation message.
pub fn parse_canonical(bytes: &[u8]) -> ProtocolResult<CanonicalMessageParts> {
    let parsed: ParsedCanonicalMessage = serde_json::from_slice(bytes)
        .map_err(|e| ProtocolError::invalid_input("canonical_message", e.to_string()))?;
    if parsed.id != PROTOCOL_ID {
        return Err(ProtocolError::invalid_input(
            "canonical_message",
            format!("unexpected protocol id `{}`", parsed.id),
        ));
    }
    if parsed.ver != CANONICAL_MESSAGE_VERSION {
        return Err(ProtocolError::invalid_input(
            "canonical_message",
            format!("unsupported canonical message version {}", parsed.ver),
        ));
    }
    let parts = CanonicalMessageParts {
        pubkey: parsed.pubkey,
        window_start: parsed.window_start,
        secret: parsed.secret,
    };
    if serialize_canonical(&parts)? != bytes {
        return Err(ProtocolError::invalid_input(
            "canonical_message",
            "message is not in canonical form",
        ));
    }
    Ok(parts)
}

/// Serializes the revoke message a wallet signs to revoke one code.
///
/// Layout: `{"id":"actioncodes-revoke","ver":1,"pubkey":..,"codeHash":..,"windowStart":..}`.
///
/// # Errors
/// Returns `MissingRequiredField` for an empty pubkey or code hash.
pub fn serialize_canonical_revoke(parts: &CanonicalRevokeMessageParts) -> ProtocolResult<Vec<u8>> {
    require_non_empty(&parts.pubkey, "pubkey")?;
    require_non_empty(&parts.code_hash, "codeHash")?;
    to_canonical_json(
        &CanonicalRevokeMessage {
            id: REVOKE_PROTOCOL_ID,
            ver: CANONICAL_MESSAGE_VERSION,
            pubkey: &parts.pubkey,
            code_hash: &parts.code_hash,
            window_start: parts.window_start,
        },
        "canonical_revoke_message",
    )
}

/// Serializes the certificate bytes the delegator signs. The signature field is excluded.
///
/// Layout: `{"version":..,"delegator":..,"delegatedPubkey":..,"issuedAt":..,"expiresAt":..,
/// "nonce":..,"chain":..}`.
///
/// # Errors
/// Returns an error if the certificate cannot be serialized.
pub fn serialize_certificate(certificate: &DelegationCertificate) -> ProtocolResult<Vec<u8>> {
    to_canonical_json(&CertificatePayload::new(certificate, None), "certificate")
}

/// Hex SHA-256 over the signed certificate (payload plus trailing `signature` key).
///
/// Any change to any field, the signature included, changes the hash.
///
/// # Errors
/// Returns an error if the certificate cannot be serialized.
pub fn certificate_hash(certificate: &DelegationCertificate) -> ProtocolResult<String> {
    let bytes = to_canonical_json(
        &CertificatePayload::new(certificate, Some(&certificate.signature)),
        "certificate",
    )?;
    Ok(hex::encode(sha256(bytes)))
}
