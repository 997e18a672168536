//! Integration tests: meta.
mod common;

use actioncodes_core::meta::{
    build_protocol_meta, build_protocol_meta_for_code, parse_protocol_meta,
    parse_protocol_meta_with_limit, validate_meta_for_code, PROTOCOL_META_MAX_BYTES,
};
use actioncodes_core::{ErrorCode, ProtocolError, ProtocolMetaFields};
use common::{clock, protocol, wallet_code, TestWallet};
use serde_json::{json, Map, Value};
use test_case::test_case;

fn params(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn test_known_wire_string() {
    let fields = ProtocolMetaFields::new("abc123", "wallet:solana")
        .with_params(params(json!({ "action": "pay-2usdc" })));
    assert_eq!(
        build_protocol_meta(&fields).unwrap(),
        "actioncodes:ver=2&id=abc123&int=wallet%3Asolana&p=%7B%22action%22%3A%22pay-2usdc%22%7D"
    );
}

#[test]
fn test_round_trip_normalizes() {
    let fields = ProtocolMetaFields::new(" Ame\u{301}lie ", "wallet:solana\n").with_params(params(
        json!({ "amount": 2, "memo": "caf\u{e9} & more", "urgent": true, "ref": null }),
    ));
    let parsed = parse_protocol_meta(&build_protocol_meta(&fields).unwrap()).unwrap();
    assert_eq!(parsed, fields.normalized());
    assert_eq!(parsed.id, "Am\u{e9}lie");
}

#[test]
fn test_params_keep_insertion_order() {
    let fields = ProtocolMetaFields::new("abc123", "wallet")
        .with_params(params(json!({ "zeta": 1, "alpha": "x" })));
    let meta = build_protocol_meta(&fields).unwrap();
    assert_eq!(
        meta,
        "actioncodes:ver=2&id=abc123&int=wallet&p=%7B%22zeta%22%3A1%2C%22alpha%22%3A%22x%22%7D"
    );

    let parsed = parse_protocol_meta(&meta).unwrap();
    let keys: Vec<&str> = parsed.params.as_ref().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["zeta", "alpha"]);
    assert_eq!(build_protocol_meta(&parsed).unwrap(), meta);
}

#[test]
fn test_size_guard() {
    let at_limit = format!(
        "actioncodes:ver=2&id=a&int={}",
        "b".repeat(PROTOCOL_META_MAX_BYTES - 27)
    );
    assert_eq!(at_limit.len(), PROTOCOL_META_MAX_BYTES);
    parse_protocol_meta(&at_limit).unwrap();

    let over = format!("{at_limit}b");
    assert!(matches!(
        parse_protocol_meta(&over),
        Err(ProtocolError::MetaTooLarge { max: 256, actual: 257, .. })
    ));
    parse_protocol_meta_with_limit(&over, 512).unwrap();
}

#[test_case("actioncodes:ver=2&id=a&int=b&memo=x" ; "unknown key")]
#[test_case("actioncodes:ver=2&id=a&int=b&VER=2" ; "keys are case sensitive")]
#[test_case("actioncodes:id=a&ver=2&ver=3&int=b" ; "duplicate key")]
#[test_case("actioncodes:ver=2&id=a&&int=b" ; "empty pair")]
#[test_case("ActionCodes:ver=2&id=a&int=b" ; "prefix is case sensitive")]
fn test_rejected_on_parse(input: &str) {
    assert_eq!(
        parse_protocol_meta(input).unwrap_err().code(),
        ErrorCode::InvalidMetaFormat
    );
}

#[test]
fn test_meta_for_generated_code() {
    let clock = clock();
    let protocol = protocol(&clock);
    let wallet = TestWallet::from_seed(1);
    let code = wallet_code(&protocol, &wallet, None);

    let meta = build_protocol_meta_for_code(
        &code.code,
        &wallet.pubkey,
        Some(params(json!({ "action": "pay-2usdc" }))),
    )
    .unwrap();
    let fields = validate_meta_for_code(&meta, &code.code, &wallet.pubkey).unwrap();
    assert_eq!(fields.id, code.code_hash());

    let other = TestWallet::from_seed(2);
    let err = validate_meta_for_code(&meta, &code.code, &other.pubkey).unwrap_err();
    let report = err.report();
    assert_eq!(report.code, ErrorCode::MetaMismatch);
    assert_eq!(report.details["expected"], other.pubkey);
    assert_eq!(report.details["actual"], wallet.pubkey);
}
