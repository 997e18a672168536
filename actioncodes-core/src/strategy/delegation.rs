//! Delegated codes: a delegator wallet authorizes a second keypair to mint codes on its behalf.
//!
//! A [`DelegatedActionCode`] is committed to the certificate it was minted under by the
//! certificate's hash. Validation checks that commitment against the certificate presented by
//! the verifier before any signature is looked at, which defeats reuse of a captured delegator
//! signature on a certificate with an altered delegate or expiry.

use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};

use crate::canonical::{certificate_hash, serialize_canonical, window_start};
use crate::clock::{Clock, SystemClock};
use crate::config::CodeGenerationConfig;
use crate::error::{ProtocolError, ProtocolResult};
use crate::signature::verify_ed25519;
use crate::strategy::wallet::WalletCodeStrategy;
use crate::types::{ActionCode, CanonicalMessageParts, DelegatedActionCode, DelegationCertificate};

/// The only supported certificate format.
pub const DELEGATION_CERTIFICATE_VERSION: &str = "1.0";
/// Longest lifetime a certificate may have (one year).
pub const MAX_DELEGATION_DURATION_MS: u64 = 365 * 24 * 60 * 60 * 1000;
/// Upper bound on the encoded delegator signature.
pub const MAX_CERTIFICATE_SIGNATURE_BYTES: usize = 512;

const NONCE_BYTES: usize = 16;
const BINDING_MISMATCH: &str = "action code does not match delegation certificate";

/// Certificate lifecycle and delegated code generation/validation.
#[derive(Debug, Clone)]
pub struct DelegationCodeStrategy {
    wallet: WalletCodeStrategy,
    clock: Arc<dyn Clock>,
}

impl DelegationCodeStrategy {
    /// Creates a strategy reading the system clock.
    #[must_use]
    pub fn new(config: CodeGenerationConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a strategy reading `clock`.
    #[must_use]
    pub fn with_clock(config: CodeGenerationConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            wallet: WalletCodeStrategy::with_clock(config, Arc::clone(&clock)),
            clock,
        }
    }

    /// The config this strategy derives codes with.
    #[must_use]
    pub const fn config(&self) -> &CodeGenerationConfig {
        self.wallet.config()
    }

    /// Builds an unsigned certificate valid from now for `duration_ms`.
    ///
    /// The delegator signs [`crate::canonical::serialize_certificate`] of the result
    /// out-of-process and attaches it with [`DelegationCertificate::with_signature`].
    ///
    /// # Errors
    /// - `MissingRequiredField` if a pubkey or the chain is empty.
    /// - `InvalidInput` if the duration is zero or longer than one year.
    pub fn create_certificate_template(
        &self,
        delegator: &str,
        delegated_pubkey: &str,
        duration_ms: u64,
        chain: &str,
    ) -> ProtocolResult<DelegationCertificate> {
        require_non_empty(delegator, "delegator")?;
        require_non_empty(delegated_pubkey, "delegatedPubkey")?;
        require_non_empty(chain, "chain")?;
        if duration_ms == 0 || duration_ms > MAX_DELEGATION_DURATION_MS {
            return Err(ProtocolError::invalid_input(
                "duration_ms",
                format!("must be within (0, {MAX_DELEGATION_DURATION_MS}]"),
            ));
        }
        let issued_at = self.clock.now_ms();
        let expires_at = issued_at
            .checked_add(duration_ms)
            .ok_or_else(|| ProtocolError::invalid_input("duration_ms", "expiry overflows"))?;

        Ok(DelegationCertificate {
            version: DELEGATION_CERTIFICATE_VERSION.to_string(),
            delegator: delegator.to_string(),
            delegated_pubkey: delegated_pubkey.to_string(),
            issued_at,
            expires_at,
            nonce: random_nonce(),
            chain: chain.to_string(),
            signature: String::new(),
        })
    }

    /// Checks version, time bounds and the presence of a signature.
    ///
    /// The signature bytes themselves are verified by the chain adapter.
    ///
    /// # Errors
    /// - `ExpiredCode` if the certificate has expired.
    /// - `InvalidCode` for a wrong version, a not-yet-valid or over-long certificate.
    /// - `MissingRequiredField` for empty fields.
    /// - `InvalidSignature` for a missing or oversized signature.
    pub fn validate_certificate(&self, certificate: &DelegationCertificate) -> ProtocolResult<()> {
        validate_certificate_at(certificate, self.clock.now_ms())
    }

    /// Mints a code for the certificate's delegator, signed by the delegate.
    ///
    /// `delegated_signature` must be the delegate's base58 ed25519 signature over the canonical
    /// message for `certificate.delegated_pubkey` in the current window.
    ///
    /// # Errors
    /// - Any certificate validation error.
    /// - `InvalidSignature` if the delegate signature is missing or does not verify.
    pub fn generate_delegated_code(
        &self,
        certificate: &DelegationCertificate,
        delegated_signature: &str,
    ) -> ProtocolResult<DelegatedActionCode> {
        let now = self.clock.now_ms();
        validate_certificate_at(certificate, now)?;
        if delegated_signature.trim().is_empty() {
            return Err(ProtocolError::invalid_signature(
                "a delegate signature over the canonical message is required",
            ));
        }

        let window = window_start(now, self.config().ttl_ms)?;
        let canonical = serialize_canonical(&CanonicalMessageParts::new(
            certificate.delegated_pubkey.clone(),
            window,
        ))?;
        verify_ed25519(&certificate.delegated_pubkey, &canonical, delegated_signature)?;

        let generated = self
            .wallet
            .generate_code(&canonical, Some(delegated_signature), None)?;
        log::debug!("minted delegated code for window {window}");

        Ok(DelegatedActionCode {
            action_code: ActionCode {
                pubkey: certificate.delegator.clone(),
                ..generated.action_code
            },
            delegated_pubkey: certificate.delegated_pubkey.clone(),
            delegated_signature: delegated_signature.to_string(),
            certificate_hash: certificate_hash(certificate)?,
            certificate: certificate.clone(),
        })
    }

    /// Validates a delegated code against the certificate presented by the verifier.
    ///
    /// Order matters: certificate freshness, then the code/certificate binding and the code's
    /// window against the certificate lifetime, and only then the delegate's signature and the
    /// code derivation.
    ///
    /// # Errors
    /// - Any certificate validation error.
    /// - `InvalidCode` ("action code does not match delegation certificate") on a binding
    ///   mismatch, with the offending field in the details.
    /// - `InvalidCode` on `timestamp` when the code's window lies outside the certificate's
    ///   validity period.
    /// - `ExpiredCode`, `InvalidSignature` or `InvalidCodeFormat` from the code checks.
    pub fn validate_delegated_code(
        &self,
        delegated: &DelegatedActionCode,
        certificate: &DelegationCertificate,
    ) -> ProtocolResult<()> {
        let now = self.clock.now_ms();
        validate_certificate_at(certificate, now)?;
        check_binding(delegated, certificate)?;
        check_window_within_certificate(
            delegated.action_code.timestamp,
            self.config().ttl_ms,
            certificate,
        )?;

        if delegated.action_code.is_expired_at(now, self.config().clock_skew_ms) {
            return Err(ProtocolError::ExpiredCode {
                expires_at: delegated.action_code.expires_at,
                now,
                clock_skew_ms: self.config().clock_skew_ms,
            });
        }
        let canonical = serialize_canonical(&CanonicalMessageParts::new(
            certificate.delegated_pubkey.clone(),
            delegated.action_code.timestamp,
        ))?;
        verify_ed25519(
            &certificate.delegated_pubkey,
            &canonical,
            &delegated.delegated_signature,
        )?;

        let as_signed = ActionCode {
            pubkey: certificate.delegated_pubkey.clone(),
            signature: Some(delegated.delegated_signature.clone()),
            secret: None,
            ..delegated.action_code.clone()
        };
        self.wallet.validate_code_at(&as_signed, now)
    }
}

fn require_non_empty(value: &str, field: &str) -> ProtocolResult<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::missing_field(field));
    }
    Ok(())
}

fn random_nonce() -> String {
    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);
    hex::encode(nonce)
}

fn validate_certificate_at(certificate: &DelegationCertificate, now: u64) -> ProtocolResult<()> {
    if certificate.version != DELEGATION_CERTIFICATE_VERSION {
        return Err(ProtocolError::InvalidCode {
            reason: format!("unsupported certificate version `{}`", certificate.version),
            field: Some("version".to_string()),
        });
    }
    require_non_empty(&certificate.delegator, "delegator")?;
    require_non_empty(&certificate.delegated_pubkey, "delegatedPubkey")?;
    require_non_empty(&certificate.nonce, "nonce")?;
    require_non_empty(&certificate.chain, "chain")?;

    if certificate.issued_at >= certificate.expires_at {
        return Err(ProtocolError::InvalidCode {
            reason: "certificate expires before it is issued".to_string(),
            field: Some("expiresAt".to_string()),
        });
    }
    if certificate.expires_at - certificate.issued_at > MAX_DELEGATION_DURATION_MS
        || certificate.expires_at > now.saturating_add(MAX_DELEGATION_DURATION_MS)
    {
        return Err(ProtocolError::InvalidCode {
            reason: "certificate lifetime exceeds one year".to_string(),
            field: Some("expiresAt".to_string()),
        });
    }
    if now < certificate.issued_at {
        return Err(ProtocolError::InvalidCode {
            reason: "certificate is not valid yet".to_string(),
            field: Some("issuedAt".to_string()),
        });
    }
    if now > certificate.expires_at {
        log::debug!("rejecting expired delegation certificate");
        return Err(ProtocolError::ExpiredCode {
            expires_at: certificate.expires_at,
            now,
            clock_skew_ms: 0,
        });
    }

    if !certificate.is_signed() {
        return Err(ProtocolError::invalid_signature("certificate is not signed"));
    }
    if certificate.signature.len() > MAX_CERTIFICATE_SIGNATURE_BYTES {
        return Err(ProtocolError::invalid_signature(format!(
            "certificate signature exceeds {MAX_CERTIFICATE_SIGNATURE_BYTES} bytes"
        )));
    }
    Ok(())
}

fn binding_mismatch(field: &str) -> ProtocolError {
    log::warn!("delegated code rejected: {field} does not match the presented certificate");
    ProtocolError::InvalidCode {
        reason: BINDING_MISMATCH.to_string(),
        field: Some(field.to_string()),
    }
}

/// Names the first field in which two certificates differ.
fn first_difference(a: &DelegationCertificate, b: &DelegationCertificate) -> &'static str {
    if a.delegator != b.delegator {
        "delegator"
    } else if a.delegated_pubkey != b.delegated_pubkey {
        "delegatedPubkey"
    } else if a.expires_at != b.expires_at {
        "expiresAt"
    } else if a.signature != b.signature {
        "signature"
    } else if a.issued_at != b.issued_at {
        "issuedAt"
    } else if a.nonce != b.nonce {
        "nonce"
    } else if a.chain != b.chain {
        "chain"
    } else if a.version != b.version {
        "version"
    } else {
        "certificateHash"
    }
}

fn check_binding(
    delegated: &DelegatedActionCode,
    certificate: &DelegationCertificate,
) -> ProtocolResult<()> {
    let presented_hash = certificate_hash(certificate)?;
    if certificate_hash(&delegated.certificate)? != delegated.certificate_hash {
        return Err(binding_mismatch("certificateHash"));
    }
    if presented_hash != delegated.certificate_hash {
        return Err(binding_mismatch(first_difference(
            &delegated.certificate,
            certificate,
        )));
    }
    if delegated.action_code.pubkey != certificate.delegator {
        return Err(binding_mismatch("delegator"));
    }
    if delegated.delegated_pubkey != certificate.delegated_pubkey {
        return Err(binding_mismatch("delegatedPubkey"));
    }
    Ok(())
}

/// The window `[timestamp, timestamp + ttl_ms)` must overlap `[issued_at, expires_at]`.
fn check_window_within_certificate(
    timestamp: u64,
    ttl_ms: u64,
    certificate: &DelegationCertificate,
) -> ProtocolResult<()> {
    if timestamp.saturating_add(ttl_ms) > certificate.issued_at
        && timestamp <= certificate.expires_at
    {
        return Ok(());
    }
    log::warn!("delegated code rejected: window {timestamp} outside certificate lifetime");
    Err(ProtocolError::InvalidCode {
        reason: "code window is outside the certificate validity period".to_string(),
        field: Some("timestamp".to_string()),
    })
}
