//! Code generation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Shortest code the protocol will derive.
pub const MIN_CODE_LENGTH: u32 = 6;
/// Longest code the protocol will derive.
pub const MAX_CODE_LENGTH: u32 = 24;
/// Default code length.
pub const DEFAULT_CODE_LENGTH: u32 = 8;
/// Default window length (two minutes).
pub const DEFAULT_TTL_MS: u64 = 120_000;
/// Default tolerated clock skew between issuer and verifier.
pub const DEFAULT_CLOCK_SKEW_MS: u64 = 30_000;

/// Parameters shared by the code strategies.
///
/// Deserializes from camelCase JSON (`codeLength`, `ttlMs`, `clockSkewMs`); omitted fields take
/// their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase", default)]
pub struct CodeGenerationConfig {
    /// Requested number of digits. Clamped to `[6, 24]` before derivation.
    pub code_length: u32,
    /// Window length in milliseconds. Codes expire `ttl_ms` after their window start.
    pub ttl_ms: u64,
    /// Grace period after expiry during which a code still validates.
    pub clock_skew_ms: u64,
}

impl Default for CodeGenerationConfig {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            ttl_ms: DEFAULT_TTL_MS,
            clock_skew_ms: DEFAULT_CLOCK_SKEW_MS,
        }
    }
}

impl CodeGenerationConfig {
    /// Creates a config with the default clock skew.
    #[must_use]
    pub const fn new(code_length: u32, ttl_ms: u64) -> Self {
        Self {
            code_length,
            ttl_ms,
            clock_skew_ms: DEFAULT_CLOCK_SKEW_MS,
        }
    }

    /// Returns a copy with a different clock skew.
    #[must_use]
    pub const fn with_clock_skew_ms(mut self, clock_skew_ms: u64) -> Self {
        self.clock_skew_ms = clock_skew_ms;
        self
    }

    /// The code length actually used for derivation.
    #[must_use]
    pub const fn effective_code_length(&self) -> usize {
        clamp_code_length(self.code_length)
    }

    /// Checks the config can drive a strategy.
    ///
    /// # Errors
    /// Returns `InvalidInput` if `ttl_ms` is zero.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.ttl_ms == 0 {
            return Err(ProtocolError::invalid_input(
                "ttl_ms",
                "window length must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Clamps a requested code length into `[MIN_CODE_LENGTH, MAX_CODE_LENGTH]`.
#[must_use]
pub const fn clamp_code_length(code_length: u32) -> usize {
    let clamped = if code_length < MIN_CODE_LENGTH {
        MIN_CODE_LENGTH
    } else if code_length > MAX_CODE_LENGTH {
        MAX_CODE_LENGTH
    } else {
        code_length
    };
    clamped as usize
}
