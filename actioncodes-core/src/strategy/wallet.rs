//! Codes bound to one wallet signature over one canonical message.

use std::sync::Arc;

use crate::canonical::{
    parse_canonical, serialize_canonical, serialize_canonical_revoke, window_start,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{CodeGenerationConfig, MAX_CODE_LENGTH, MIN_CODE_LENGTH};
use crate::digest::{code_hash, codes_match, derive_code};
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{ActionCode, CanonicalMessageParts, CanonicalRevokeMessageParts};

const SECRET_HINT_LEN: usize = 8;

/// Output of [`WalletCodeStrategy::generate_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeGenerationResult {
    /// The derived code.
    pub action_code: ActionCode,
    /// The canonical bytes the code was derived from.
    pub canonical_message: Vec<u8>,
}

/// Generates and validates codes bound to a wallet signature.
///
/// The strategy holds no state besides its config and clock. It only proves that a code was
/// derived from a signed canonical message; whether the signature itself is valid for the pubkey
/// is checked by a chain adapter.
#[derive(Debug, Clone)]
pub struct WalletCodeStrategy {
    config: CodeGenerationConfig,
    clock: Arc<dyn Clock>,
}

impl WalletCodeStrategy {
    /// Creates a strategy reading the system clock.
    #[must_use]
    pub fn new(config: CodeGenerationConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a strategy reading `clock`.
    #[must_use]
    pub const fn with_clock(config: CodeGenerationConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// The config this strategy derives codes with.
    #[must_use]
    pub const fn config(&self) -> &CodeGenerationConfig {
        &self.config
    }

    /// Canonical bytes for `pubkey` in the current window. This is what the wallet signs.
    ///
    /// # Errors
    /// Returns an error if the pubkey or secret is empty, or the config has a zero ttl.
    pub fn canonical_message(&self, pubkey: &str, secret: Option<&str>) -> ProtocolResult<Vec<u8>> {
        let window = window_start(self.clock.now_ms(), self.config.ttl_ms)?;
        serialize_canonical(&CanonicalMessageParts {
            pubkey: pubkey.to_string(),
            window_start: window,
            secret: secret.map(str::to_string),
        })
    }

    /// Derives a code from a signed canonical message.
    ///
    /// A non-empty signature is mandatory: pubkey and window alone must never be enough to
    /// compute a valid code. If `secret` is given it must equal the secret embedded in the
    /// canonical message.
    ///
    /// # Errors
    /// - `InvalidSignature` if the signature is missing or blank.
    /// - `InvalidInput` if the message is not canonical, its window is not aligned to the
    ///   configured ttl, or `secret` disagrees with the message.
    pub fn generate_code(
        &self,
        canonical_message: &[u8],
        signature: Option<&str>,
        secret: Option<&str>,
    ) -> ProtocolResult<CodeGenerationResult> {
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ProtocolError::invalid_signature(
                    "a signature over the canonical message is required",
                )
            })?;

        let parts = parse_canonical(canonical_message)?;
        if secret.is_some() && secret != parts.secret.as_deref() {
            return Err(ProtocolError::invalid_input(
                "secret",
                "secret does not match the canonical message",
            ));
        }
        if self.config.ttl_ms == 0 || parts.window_start % self.config.ttl_ms != 0 {
            return Err(ProtocolError::invalid_input(
                "windowStart",
                format!("not aligned to a {}ms window", self.config.ttl_ms),
            ));
        }
        let expires_at = parts
            .window_start
            .checked_add(self.config.ttl_ms)
            .ok_or_else(|| ProtocolError::invalid_input("windowStart", "window overflows"))?;

        let code = derive_code(
            canonical_message,
            signature,
            parts.secret.as_deref(),
            self.config.code_length,
        )?;
        log::debug!(
            "derived {}-digit wallet code for window {}",
            code.len(),
            parts.window_start
        );

        let secret_hint = parts.secret.as_deref().map(secret_hint);
        Ok(CodeGenerationResult {
            action_code: ActionCode {
                code,
                pubkey: parts.pubkey,
                timestamp: parts.window_start,
                expires_at,
                signature: Some(signature.to_string()),
                secret: parts.secret,
                secret_hint,
            },
            canonical_message: canonical_message.to_vec(),
        })
    }

    /// Checks that `action_code` is unexpired and matches its own derivation.
    ///
    /// # Errors
    /// - `ExpiredCode` if now is past `expires_at + clock_skew_ms`.
    /// - `InvalidCode` if `expires_at` is not `timestamp + ttl_ms`.
    /// - `InvalidSignature` if the code carries no signature.
    /// - `InvalidCodeFormat` if the code is malformed or differs from the recomputed one.
    pub fn validate_code(&self, action_code: &ActionCode) -> ProtocolResult<()> {
        self.validate_code_at(action_code, self.clock.now_ms())
    }

    pub(crate) fn validate_code_at(
        &self,
        action_code: &ActionCode,
        now: u64,
    ) -> ProtocolResult<()> {
        if action_code.is_expired_at(now, self.config.clock_skew_ms) {
            log::debug!("rejecting expired code for window {}", action_code.timestamp);
            return Err(ProtocolError::ExpiredCode {
                expires_at: action_code.expires_at,
                now,
                clock_skew_ms: self.config.clock_skew_ms,
            });
        }
        check_code_format(&action_code.code)?;
        if action_code.timestamp.checked_add(self.config.ttl_ms) != Some(action_code.expires_at) {
            return Err(ProtocolError::InvalidCode {
                reason: "expiry does not match the configured window length".to_string(),
                field: Some("expiresAt".to_string()),
            });
        }
        let signature = action_code
            .signature
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ProtocolError::invalid_signature("action code carries no signature"))?;

        let canonical = serialize_canonical(&CanonicalMessageParts::from_action_code(action_code))?;
        let expected = derive_code(
            &canonical,
            signature,
            action_code.secret.as_deref(),
            self.config.code_length,
        )?;
        if !codes_match(&expected, &action_code.code) {
            log::debug!("code mismatch for window {}", action_code.timestamp);
            return Err(ProtocolError::InvalidCodeFormat {
                reason: "code does not match its derivation".to_string(),
            });
        }
        Ok(())
    }

    /// Parts of the revoke message for `action_code`.
    #[must_use]
    pub fn revoke_parts(&self, action_code: &ActionCode) -> CanonicalRevokeMessageParts {
        CanonicalRevokeMessageParts {
            pubkey: action_code.pubkey.clone(),
            code_hash: code_hash(&action_code.code),
            window_start: action_code.timestamp,
        }
    }

    /// Revoke message bytes the owner of `action_code` signs to revoke it.
    ///
    /// # Errors
    /// Returns `MissingRequiredField` if the code has no pubkey.
    pub fn revoke_message(&self, action_code: &ActionCode) -> ProtocolResult<Vec<u8>> {
        serialize_canonical_revoke(&self.revoke_parts(action_code))
    }
}

fn check_code_format(code: &str) -> ProtocolResult<()> {
    let len = code.len();
    if len < MIN_CODE_LENGTH as usize || len > MAX_CODE_LENGTH as usize {
        return Err(ProtocolError::InvalidCodeFormat {
            reason: format!("code length {len} outside [{MIN_CODE_LENGTH}, {MAX_CODE_LENGTH}]"),
        });
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidCodeFormat {
            reason: "code must contain only decimal digits".to_string(),
        });
    }
    Ok(())
}

fn secret_hint(secret: &str) -> String {
    let mut hint = code_hash(secret);
    hint.truncate(SECRET_HINT_LEN);
    hint
}
