//! Solana: base58 ed25519 keys and detached ed25519 signatures.

use crate::adapter::{
    ChainVerificationContract, DelegationVerification, RevokeVerification, WalletVerification,
};
use crate::canonical::{serialize_canonical, serialize_canonical_revoke, serialize_certificate};
use crate::error::{ProtocolError, ProtocolResult};
use crate::signature::verify_ed25519;

/// Chain identifier the adapter is registered under.
pub const SOLANA_CHAIN: &str = "solana";

/// Verifies detached ed25519 signatures made by Solana wallets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolanaAdapter;

impl SolanaAdapter {
    /// Creates the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn signer_mismatch(intended: &str, signer: &str) -> ProtocolError {
    ProtocolError::TransactionNotSignedByIntendedOwner {
        intended: intended.to_string(),
        signers: vec![signer.to_string()],
    }
}

impl ChainVerificationContract for SolanaAdapter {
    fn check_wallet(&self, request: &WalletVerification<'_>) -> ProtocolResult<()> {
        if request.pubkey != request.parts.pubkey {
            return Err(signer_mismatch(&request.parts.pubkey, request.pubkey));
        }
        let message = serialize_canonical(request.parts)?;
        verify_ed25519(request.pubkey, &message, request.signature)
    }

    fn check_delegation(&self, request: &DelegationVerification<'_>) -> ProtocolResult<()> {
        let certificate = request.certificate;
        if certificate.chain != request.chain {
            return Err(ProtocolError::InvalidAdapter {
                chain: certificate.chain.clone(),
                reason: format!("certificate is not for {}", request.chain),
            });
        }
        if request.pubkey != certificate.delegator {
            return Err(signer_mismatch(&certificate.delegator, request.pubkey));
        }
        let message = serialize_certificate(certificate)?;
        verify_ed25519(request.pubkey, &message, request.signature)
    }

    fn check_revoke(&self, request: &RevokeVerification<'_>) -> ProtocolResult<()> {
        if request.pubkey != request.parts.pubkey {
            return Err(signer_mismatch(&request.parts.pubkey, request.pubkey));
        }
        let message = serialize_canonical_revoke(request.parts)?;
        verify_ed25519(request.pubkey, &message, request.signature)
    }
}
