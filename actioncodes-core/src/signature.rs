//! Ed25519 verification over base58-encoded keys and signatures.
//!
//! Delegated codes are verified here directly, without a chain adapter: a delegate's authority
//! is attested by certificate bytes alone. The built-in Solana adapter reuses the same helpers.

use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

use crate::error::{ProtocolError, ProtocolResult};

/// Decodes a base58 ed25519 public key.
///
/// # Errors
/// Returns `InvalidPubkeyFormat` if the key is not 32 base58 bytes on the curve.
pub fn decode_pubkey(pubkey: &str) -> ProtocolResult<VerifyingKey> {
    let bytes = bs58::decode(pubkey.trim())
        .into_vec()
        .map_err(|e| ProtocolError::InvalidPubkeyFormat {
            reason: format!("invalid base58: {e}"),
        })?;
    let len = bytes.len();
    let bytes: [u8; PUBLIC_KEY_LENGTH] =
        bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidPubkeyFormat {
                reason: format!("expected {PUBLIC_KEY_LENGTH} bytes, got {len}"),
            })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| ProtocolError::InvalidPubkeyFormat {
        reason: e.to_string(),
    })
}

/// Decodes a base58 ed25519 signature.
///
/// # Errors
/// Returns `InvalidSignature` if the signature is not 64 base58 bytes.
pub fn decode_signature(signature: &str) -> ProtocolResult<Signature> {
    let bytes = bs58::decode(signature.trim())
        .into_vec()
        .map_err(|e| ProtocolError::invalid_signature(format!("invalid base58: {e}")))?;
    let len = bytes.len();
    let bytes: [u8; SIGNATURE_LENGTH] = bytes.try_into().map_err(|_| {
        ProtocolError::invalid_signature(format!("expected {SIGNATURE_LENGTH} bytes, got {len}"))
    })?;
    Ok(Signature::from_bytes(&bytes))
}

/// Verifies `signature` by `pubkey` over `message`.
///
/// Both encodings are decoded before either failure is reported, and every failure collapses to
/// `InvalidSignature` so callers cannot tell a bad key from a bad signature.
///
/// # Errors
/// Returns `InvalidSignature` if decoding or verification fails.
pub fn verify_ed25519(pubkey: &str, message: &[u8], signature: &str) -> ProtocolResult<()> {
    let key = decode_pubkey(pubkey);
    let signature = decode_signature(signature);
    let (Ok(key), Ok(signature)) = (key, signature) else {
        return Err(ProtocolError::invalid_signature(
            "signature does not verify for pubkey",
        ));
    };
    key.verify_strict(message, &signature)
        .map_err(|_| ProtocolError::invalid_signature("signature does not verify for pubkey"))
}

/// Base58 encoding of raw key or signature bytes.
#[must_use]
pub fn encode_base58(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}
