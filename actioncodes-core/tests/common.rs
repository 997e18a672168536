#![allow(dead_code, missing_docs)]

//! Common test utilities shared across integration tests.

use std::sync::Arc;

use actioncodes_core::canonical::{serialize_canonical, serialize_certificate, window_start};
use actioncodes_core::protocol::{ActionCodesProtocol, CodeRequest, GeneratedCode};
use actioncodes_core::signature::encode_base58;
use actioncodes_core::{
    ActionCode, CanonicalMessageParts, CodeGenerationConfig, DelegatedActionCode,
    DelegationCertificate, FixedClock,
};
use ed25519_dalek::{Signer, SigningKey};

/// 2025-10-06T08:02:30Z, inside the window starting at [`WINDOW_START`].
pub const NOW: u64 = 1_759_737_750_000;
pub const WINDOW_START: u64 = 1_759_737_720_000;
pub const HOUR_MS: u64 = 60 * 60 * 1000;

/// Deterministic ed25519 keypair standing in for a Solana wallet.
pub struct TestWallet {
    key: SigningKey,
    pub pubkey: String,
}

impl TestWallet {
    pub fn from_seed(seed: u8) -> Self {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let pubkey = encode_base58(key.verifying_key().as_bytes());
        Self { key, pubkey }
    }

    pub fn sign(&self, message: &[u8]) -> String {
        encode_base58(&self.key.sign(message).to_bytes())
    }
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(NOW))
}

pub fn protocol_with(config: CodeGenerationConfig, clock: &Arc<FixedClock>) -> ActionCodesProtocol {
    ActionCodesProtocol::with_clock(config, clock.clone()).expect("valid config")
}

pub fn protocol(clock: &Arc<FixedClock>) -> ActionCodesProtocol {
    protocol_with(CodeGenerationConfig::default(), clock)
}

/// Signs the current canonical message with `wallet` and generates its code.
pub fn wallet_code(
    protocol: &ActionCodesProtocol,
    wallet: &TestWallet,
    secret: Option<&str>,
) -> ActionCode {
    let message = protocol
        .canonical_message(&wallet.pubkey, secret)
        .expect("canonical message");
    let signature = wallet.sign(&message);
    match protocol
        .generate_code(CodeRequest::Wallet {
            canonical_message: &message,
            signature: Some(&signature),
            secret,
        })
        .expect("wallet code")
    {
        GeneratedCode::Wallet(result) => result.action_code,
        GeneratedCode::Delegation(_) => unreachable!(),
    }
}

/// A certificate from `delegator` to `delegate`, signed by `delegator`.
pub fn signed_certificate(
    protocol: &ActionCodesProtocol,
    delegator: &TestWallet,
    delegate: &TestWallet,
    duration_ms: u64,
) -> DelegationCertificate {
    let template = protocol
        .delegation_strategy()
        .create_certificate_template(&delegator.pubkey, &delegate.pubkey, duration_ms, "solana")
        .expect("template");
    let signature = delegator.sign(&serialize_certificate(&template).expect("certificate bytes"));
    template.with_signature(signature)
}

/// The delegate's signature over its canonical message for the window containing `now`.
pub fn delegate_signature(delegate: &TestWallet, now: u64, ttl_ms: u64) -> String {
    let window = window_start(now, ttl_ms).expect("window");
    let message = serialize_canonical(&CanonicalMessageParts::new(delegate.pubkey.clone(), window))
        .expect("canonical message");
    delegate.sign(&message)
}

pub fn delegated_code(
    protocol: &ActionCodesProtocol,
    certificate: &DelegationCertificate,
    delegate: &TestWallet,
    now: u64,
) -> DelegatedActionCode {
    let signature = delegate_signature(delegate, now, protocol.config().ttl_ms);
    match protocol
        .generate_code(CodeRequest::Delegation {
            certificate: Some(certificate),
            delegated_signature: Some(&signature),
        })
        .expect("delegated code")
    {
        GeneratedCode::Delegation(delegated) => *delegated,
        GeneratedCode::Wallet(_) => unreachable!(),
    }
}
