//! The protocol facade: strategy dispatch plus the chain adapter registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::adapter::{
    solana::SOLANA_CHAIN, ChainVerificationContract, DelegationVerification, RevokeVerification,
    SolanaAdapter, WalletVerification,
};
use crate::clock::{Clock, SystemClock};
use crate::config::CodeGenerationConfig;
use crate::error::{ProtocolError, ProtocolResult};
use crate::strategy::{CodeGenerationResult, DelegationCodeStrategy, WalletCodeStrategy};
use crate::types::{ActionCode, CanonicalMessageParts, DelegatedActionCode, DelegationCertificate};

/// Input to [`ActionCodesProtocol::generate_code`].
#[derive(Debug, Clone, Copy)]
pub enum CodeRequest<'a> {
    /// A wallet signed the canonical message itself.
    Wallet {
        /// Canonical message bytes.
        canonical_message: &'a [u8],
        /// Wallet signature over `canonical_message`.
        signature: Option<&'a str>,
        /// Secret embedded in `canonical_message`, if any.
        secret: Option<&'a str>,
    },
    /// A certified delegate signed the canonical message.
    Delegation {
        /// The signed certificate.
        certificate: Option<&'a DelegationCertificate>,
        /// Delegate signature over the canonical message for the current window.
        delegated_signature: Option<&'a str>,
    },
}

/// Output of [`ActionCodesProtocol::generate_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedCode {
    /// A wallet code and the bytes it was derived from.
    Wallet(CodeGenerationResult),
    /// A delegated code.
    Delegation(Box<DelegatedActionCode>),
}

impl GeneratedCode {
    /// The underlying action code.
    #[must_use]
    pub fn action_code(&self) -> &ActionCode {
        match self {
            Self::Wallet(result) => &result.action_code,
            Self::Delegation(delegated) => &delegated.action_code,
        }
    }
}

/// Input to [`ActionCodesProtocol::validate_code`].
#[derive(Debug, Clone, Copy)]
pub enum ValidationTarget<'a> {
    /// A wallet code.
    Wallet(&'a ActionCode),
    /// A delegated code with the certificate the verifier holds for it.
    Delegation {
        /// The delegated code.
        code: &'a DelegatedActionCode,
        /// Certificate presented by the verifier.
        certificate: &'a DelegationCertificate,
    },
}

/// Which adapter should confirm a wallet signature.
#[derive(Debug, Clone, Copy)]
pub struct VerificationContext<'a> {
    /// Registered chain identifier.
    pub chain: &'a str,
}

type Registry = HashMap<String, Arc<dyn ChainVerificationContract>>;

/// Entry point tying both strategies to the chain adapters.
///
/// Code derivation is chain agnostic. Signatures are only checked against a chain when the
/// caller asks for it, through the adapter registered under that chain's name. The Solana
/// adapter is registered on construction.
#[derive(Debug)]
pub struct ActionCodesProtocol {
    config: CodeGenerationConfig,
    wallet: WalletCodeStrategy,
    delegation: DelegationCodeStrategy,
    adapters: RwLock<Registry>,
}

impl ActionCodesProtocol {
    /// Creates a protocol instance reading the system clock.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the config is invalid.
    pub fn new(config: CodeGenerationConfig) -> ProtocolResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a protocol instance reading `clock`.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the config is invalid.
    pub fn with_clock(config: CodeGenerationConfig, clock: Arc<dyn Clock>) -> ProtocolResult<Self> {
        config.validate()?;
        let mut adapters: Registry = HashMap::new();
        adapters.insert(SOLANA_CHAIN.to_string(), Arc::new(SolanaAdapter::new()));
        Ok(Self {
            wallet: WalletCodeStrategy::with_clock(config, Arc::clone(&clock)),
            delegation: DelegationCodeStrategy::with_clock(config, clock),
            config,
            adapters: RwLock::new(adapters),
        })
    }

    /// The active config.
    #[must_use]
    pub const fn config(&self) -> &CodeGenerationConfig {
        &self.config
    }

    /// The wallet strategy.
    #[must_use]
    pub const fn wallet_strategy(&self) -> &WalletCodeStrategy {
        &self.wallet
    }

    /// The delegation strategy.
    #[must_use]
    pub const fn delegation_strategy(&self) -> &DelegationCodeStrategy {
        &self.delegation
    }

    /// Registers `adapter` for `chain`, replacing any previous one.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty chain name.
    /// - `InvalidAdapter` if the registry lock is poisoned.
    pub fn register_adapter(
        &self,
        chain: &str,
        adapter: Arc<dyn ChainVerificationContract>,
    ) -> ProtocolResult<()> {
        let chain = chain.trim();
        if chain.is_empty() {
            return Err(ProtocolError::invalid_input("chain", "chain name must not be empty"));
        }
        let replaced = self
            .adapters
            .write()
            .map_err(|_| poisoned(chain))?
            .insert(chain.to_string(), adapter)
            .is_some();
        if replaced {
            log::debug!("replaced adapter for {chain}");
        }
        Ok(())
    }

    /// The adapter registered for `chain`.
    ///
    /// # Errors
    /// Returns `InvalidAdapter` if none is registered.
    pub fn adapter(&self, chain: &str) -> ProtocolResult<Arc<dyn ChainVerificationContract>> {
        let adapter = self
            .adapters
            .read()
            .map_err(|_| poisoned(chain))?
            .get(chain)
            .cloned();
        adapter.ok_or_else(|| {
            log::debug!("no adapter registered for {chain}");
            ProtocolError::InvalidAdapter {
                chain: chain.to_string(),
                reason: "no adapter registered".to_string(),
            }
        })
    }

    /// Registered chain names, sorted.
    ///
    /// # Errors
    /// Returns `InvalidAdapter` if the registry lock is poisoned.
    pub fn registered_chains(&self) -> ProtocolResult<Vec<String>> {
        let mut chains: Vec<String> = self
            .adapters
            .read()
            .map_err(|_| poisoned("*"))?
            .keys()
            .cloned()
            .collect();
        chains.sort();
        Ok(chains)
    }

    /// Canonical bytes for `pubkey` in the current window.
    ///
    /// # Errors
    /// Returns an error if the pubkey or secret is empty.
    pub fn canonical_message(&self, pubkey: &str, secret: Option<&str>) -> ProtocolResult<Vec<u8>> {
        self.wallet.canonical_message(pubkey, secret)
    }

    /// Generates a code with the strategy matching `request`.
    ///
    /// # Errors
    /// - `MissingRequiredField` for a delegation request without a certificate.
    /// - `InvalidSignature` for a missing signature.
    /// - Any error of the selected strategy.
    pub fn generate_code(&self, request: CodeRequest<'_>) -> ProtocolResult<GeneratedCode> {
        match request {
            CodeRequest::Wallet {
                canonical_message,
                signature,
                secret,
            } => self
                .wallet
                .generate_code(canonical_message, signature, secret)
                .map(GeneratedCode::Wallet),
            CodeRequest::Delegation {
                certificate,
                delegated_signature,
            } => {
                let certificate =
                    certificate.ok_or_else(|| ProtocolError::missing_field("certificate"))?;
                let delegated_signature = delegated_signature.ok_or_else(|| {
                    ProtocolError::invalid_signature("a delegate signature is required")
                })?;
                self.delegation
                    .generate_delegated_code(certificate, delegated_signature)
                    .map(|delegated| GeneratedCode::Delegation(Box::new(delegated)))
            }
        }
    }

    /// Validates a code and, when asked or required, its signature on chain.
    ///
    /// Wallet codes are checked against an adapter only when `context` names a chain.
    /// Delegated codes always have their certificate signature checked by the adapter for the
    /// certificate's chain.
    ///
    /// # Errors
    /// - Any error of the selected strategy.
    /// - `InvalidAdapter` if the chain has no adapter.
    /// - `InvalidSignature` if the adapter rejects the signature.
    pub fn validate_code(
        &self,
        target: ValidationTarget<'_>,
        context: Option<&VerificationContext<'_>>,
    ) -> ProtocolResult<()> {
        match target {
            ValidationTarget::Wallet(action_code) => {
                self.wallet.validate_code(action_code)?;
                let Some(context) = context else {
                    return Ok(());
                };
                let signature = action_code.signature.as_deref().unwrap_or_default();
                let parts = CanonicalMessageParts::from_action_code(action_code);
                let verified = self.adapter(context.chain)?.verify_with_wallet(&WalletVerification {
                    chain: context.chain,
                    parts: &parts,
                    pubkey: &action_code.pubkey,
                    signature,
                });
                ensure_verified(verified, "wallet signature rejected by chain adapter")
            }
            ValidationTarget::Delegation { code, certificate } => {
                self.delegation.validate_delegated_code(code, certificate)?;
                let verified = self.adapter(&certificate.chain)?.verify_with_delegation(
                    &DelegationVerification {
                        chain: &certificate.chain,
                        pubkey: &certificate.delegator,
                        signature: &certificate.signature,
                        certificate,
                    },
                );
                ensure_verified(verified, "certificate signature rejected by chain adapter")
            }
        }
    }

    /// Checks a revoke signature by the owner of `action_code`.
    ///
    /// # Errors
    /// - `InvalidAdapter` if the chain has no adapter.
    /// - `InvalidSignature` if the adapter rejects the signature.
    pub fn validate_revoke(
        &self,
        action_code: &ActionCode,
        chain: &str,
        revoke_signature: &str,
    ) -> ProtocolResult<()> {
        let parts = self.wallet.revoke_parts(action_code);
        let verified = self.adapter(chain)?.verify_revoke_with_wallet(&RevokeVerification {
            chain,
            parts: &parts,
            pubkey: &action_code.pubkey,
            signature: revoke_signature,
        });
        ensure_verified(verified, "revoke signature rejected by chain adapter")
    }
}

fn poisoned(chain: &str) -> ProtocolError {
    log::warn!("adapter registry lock poisoned");
    ProtocolError::InvalidAdapter {
        chain: chain.to_string(),
        reason: "adapter registry is unavailable".to_string(),
    }
}

fn ensure_verified(verified: bool, reason: &str) -> ProtocolResult<()> {
    if verified {
        Ok(())
    } else {
        Err(ProtocolError::invalid_signature(reason))
    }
}
