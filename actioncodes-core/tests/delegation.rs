//! Integration tests: delegation.
mod common;

use actioncodes_core::canonical::{certificate_hash, serialize_canonical, window_start};
use actioncodes_core::protocol::ValidationTarget;
use actioncodes_core::{ActionCode, CanonicalMessageParts, ErrorCode, ProtocolError};
use common::{
    clock, delegate_signature, delegated_code, protocol, signed_certificate, TestWallet, HOUR_MS,
    NOW,
};

const BINDING_MISMATCH: &str = "action code does not match delegation certificate";

fn assert_binding_mismatch(result: Result<(), ProtocolError>, field: &str) {
    let err = result.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidCode);
    assert!(err.to_string().contains(BINDING_MISMATCH), "{err}");
    assert_eq!(err.details()["field"], field);
}

#[test]
fn test_delegated_code_round_trip() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let certificate = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);
    let delegated = delegated_code(&protocol, &certificate, &delegate, NOW);

    assert_eq!(delegated.delegator(), delegator.pubkey);
    assert_eq!(delegated.delegated_pubkey, delegate.pubkey);
    protocol
        .validate_code(
            ValidationTarget::Delegation {
                code: &delegated,
                certificate: &certificate,
            },
            None,
        )
        .unwrap();
}

#[test]
fn test_stolen_certificate_signature_on_forged_certificate() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate, attacker) = (
        TestWallet::from_seed(1),
        TestWallet::from_seed(2),
        TestWallet::from_seed(66),
    );
    let genuine = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);

    // Same delegator and signature, attacker's key as the delegate.
    let mut forged = genuine.clone();
    forged.delegated_pubkey = attacker.pubkey.clone();
    let minted = delegated_code(&protocol, &forged, &attacker, NOW);

    let err = protocol
        .validate_code(
            ValidationTarget::Delegation {
                code: &minted,
                certificate: &forged,
            },
            None,
        )
        .unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidSignature { .. }));

    // Presenting the genuine certificate instead trips the binding check first.
    assert_binding_mismatch(
        protocol.validate_code(
            ValidationTarget::Delegation {
                code: &minted,
                certificate: &genuine,
            },
            None,
        ),
        "delegatedPubkey",
    );
}

#[test]
fn test_extended_certificate_is_rejected() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let certificate = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);
    let delegated = delegated_code(&protocol, &certificate, &delegate, NOW);

    let mut extended = certificate;
    extended.expires_at += 24 * HOUR_MS;
    assert_binding_mismatch(
        protocol.validate_code(
            ValidationTarget::Delegation {
                code: &delegated,
                certificate: &extended,
            },
            None,
        ),
        "expiresAt",
    );
}

#[test]
fn test_code_from_a_sibling_certificate_is_rejected() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let first = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);
    let second = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);
    let delegated = delegated_code(&protocol, &first, &delegate, NOW);

    let err = protocol
        .validate_code(
            ValidationTarget::Delegation {
                code: &delegated,
                certificate: &second,
            },
            None,
        )
        .unwrap_err();
    assert!(err.to_string().contains(BINDING_MISMATCH));
}

#[test]
fn test_tampered_commitment_is_rejected() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let first = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);
    let second = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);

    let mut delegated = delegated_code(&protocol, &first, &delegate, NOW);
    delegated.certificate_hash = certificate_hash(&second).unwrap();
    assert_binding_mismatch(
        protocol.validate_code(
            ValidationTarget::Delegation {
                code: &delegated,
                certificate: &second,
            },
            None,
        ),
        "certificateHash",
    );
}

#[test]
fn test_relabelled_delegator_is_rejected() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let certificate = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);

    let mut delegated = delegated_code(&protocol, &certificate, &delegate, NOW);
    delegated.action_code.pubkey = TestWallet::from_seed(3).pubkey;
    assert_binding_mismatch(
        protocol.validate_code(
            ValidationTarget::Delegation {
                code: &delegated,
                certificate: &certificate,
            },
            None,
        ),
        "delegator",
    );
}

#[test]
fn test_delegate_signature_from_another_window_is_rejected() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let certificate = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);

    let stale = delegate_signature(&delegate, NOW - 120_000, protocol.config().ttl_ms);
    assert!(matches!(
        protocol
            .delegation_strategy()
            .generate_delegated_code(&certificate, &stale),
        Err(ProtocolError::InvalidSignature { .. })
    ));
}

#[test]
fn test_expired_certificate() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let certificate = signed_certificate(&protocol, &delegator, &delegate, 60_000);
    let delegated = delegated_code(&protocol, &certificate, &delegate, NOW);

    clock.advance(60_001);
    assert!(matches!(
        protocol.validate_code(
            ValidationTarget::Delegation {
                code: &delegated,
                certificate: &certificate,
            },
            None,
        ),
        Err(ProtocolError::ExpiredCode { .. })
    ));
}

#[test]
fn test_presented_certificate_with_another_signature_is_rejected() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let certificate = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);
    let delegated = delegated_code(&protocol, &certificate, &delegate, NOW);

    let resigned = certificate
        .clone()
        .with_signature(delegator.sign(b"some other message"));
    assert_binding_mismatch(
        protocol.validate_code(
            ValidationTarget::Delegation {
                code: &delegated,
                certificate: &resigned,
            },
            None,
        ),
        "signature",
    );
}

#[test]
fn test_presented_certificate_with_another_delegator_is_rejected() {
    let clock = clock();
    let protocol = protocol(&clock);
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let certificate = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);
    let delegated = delegated_code(&protocol, &certificate, &delegate, NOW);

    // Stolen delegator signature under someone else's name.
    let mut swapped = certificate;
    swapped.delegator = TestWallet::from_seed(3).pubkey;
    assert_binding_mismatch(
        protocol.validate_code(
            ValidationTarget::Delegation {
                code: &delegated,
                certificate: &swapped,
            },
            None,
        ),
        "delegator",
    );
}

#[test]
fn test_code_for_a_window_after_certificate_expiry_is_rejected() {
    let clock = clock();
    let protocol = protocol(&clock);
    let ttl_ms = protocol.config().ttl_ms;
    let (delegator, delegate) = (TestWallet::from_seed(1), TestWallet::from_seed(2));
    let certificate = signed_certificate(&protocol, &delegator, &delegate, HOUR_MS);
    let genuine = delegated_code(&protocol, &certificate, &delegate, NOW);

    // The delegate signs a window a day ahead, long after the certificate lapses.
    let later = window_start(NOW + 24 * HOUR_MS, ttl_ms).unwrap();
    assert!(later > certificate.expires_at);
    let message =
        serialize_canonical(&CanonicalMessageParts::new(delegate.pubkey.clone(), later)).unwrap();
    let signature = delegate.sign(&message);
    let future = protocol
        .wallet_strategy()
        .generate_code(&message, Some(&signature), None)
        .unwrap();

    let mut forged = genuine;
    forged.action_code = ActionCode {
        pubkey: delegator.pubkey.clone(),
        ..future.action_code
    };
    forged.delegated_signature = signature;

    let err = protocol
        .validate_code(
            ValidationTarget::Delegation {
                code: &forged,
                certificate: &certificate,
            },
            None,
        )
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidCode);
    assert_eq!(err.details()["field"], "timestamp");
}
