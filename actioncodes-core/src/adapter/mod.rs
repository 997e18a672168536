//! Chain verification adapters.
//!
//! An adapter knows how one chain encodes keys and signatures. The protocol hands it the
//! canonical parts of a message and the claimed signer; the adapter rebuilds the exact bytes
//! with [`crate::canonical`] and checks the signature.
//!
//! Implementors only write the `check_*` methods, which report why verification failed. The
//! provided `verify_*` methods fold every failure, panics included, into `false` so a faulty
//! adapter can never turn into an accepted code.

use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::ProtocolResult;
use crate::types::{CanonicalMessageParts, CanonicalRevokeMessageParts, DelegationCertificate};

pub mod solana;

pub use solana::SolanaAdapter;

/// A wallet signature over a canonical generation message.
#[derive(Debug, Clone, Copy)]
pub struct WalletVerification<'a> {
    /// Chain the signature belongs to.
    pub chain: &'a str,
    /// Parts of the signed message.
    pub parts: &'a CanonicalMessageParts,
    /// Claimed signer.
    pub pubkey: &'a str,
    /// Encoded signature.
    pub signature: &'a str,
}

/// A delegator signature over a delegation certificate.
#[derive(Debug, Clone, Copy)]
pub struct DelegationVerification<'a> {
    /// Chain the signature belongs to.
    pub chain: &'a str,
    /// Claimed signer, the certificate's delegator.
    pub pubkey: &'a str,
    /// Encoded signature.
    pub signature: &'a str,
    /// The signed certificate.
    pub certificate: &'a DelegationCertificate,
}

/// An owner signature over a canonical revoke message.
#[derive(Debug, Clone, Copy)]
pub struct RevokeVerification<'a> {
    /// Chain the signature belongs to.
    pub chain: &'a str,
    /// Parts of the signed revoke message.
    pub parts: &'a CanonicalRevokeMessageParts,
    /// Claimed signer.
    pub pubkey: &'a str,
    /// Encoded signature.
    pub signature: &'a str,
}

/// Signature verification for one chain.
pub trait ChainVerificationContract: Send + Sync + Debug {
    /// Checks a wallet signature over a generation message.
    ///
    /// # Errors
    /// Returns the reason the signature is not acceptable.
    fn check_wallet(&self, request: &WalletVerification<'_>) -> ProtocolResult<()>;

    /// Checks a delegator signature over a certificate.
    ///
    /// # Errors
    /// Returns the reason the signature is not acceptable.
    fn check_delegation(&self, request: &DelegationVerification<'_>) -> ProtocolResult<()>;

    /// Checks an owner signature over a revoke message.
    ///
    /// # Errors
    /// Returns the reason the signature is not acceptable.
    fn check_revoke(&self, request: &RevokeVerification<'_>) -> ProtocolResult<()>;

    /// Whether the wallet signature is valid. Never panics.
    #[must_use]
    fn verify_with_wallet(&self, request: &WalletVerification<'_>) -> bool {
        fold("wallet", request.chain, || self.check_wallet(request))
    }

    /// Whether the certificate signature is valid. Never panics.
    #[must_use]
    fn verify_with_delegation(&self, request: &DelegationVerification<'_>) -> bool {
        fold("delegation", request.chain, || self.check_delegation(request))
    }

    /// Whether the revoke signature is valid. Never panics.
    #[must_use]
    fn verify_revoke_with_wallet(&self, request: &RevokeVerification<'_>) -> bool {
        fold("revoke", request.chain, || self.check_revoke(request))
    }
}

fn fold(kind: &str, chain: &str, check: impl FnOnce() -> ProtocolResult<()>) -> bool {
    match catch_unwind(AssertUnwindSafe(check)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::debug!("{kind} verification failed on {chain}: {}", e.code());
            false
        }
        Err(_) => {
            log::warn!("{kind} verifier for {chain} panicked");
            false
        }
    }
}
