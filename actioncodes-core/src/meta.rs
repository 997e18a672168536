//! Protocol meta: the wire string binding a code to an external transaction.
//!
//! ```text
//! actioncodes:ver=2&id=<code hash>&int=<intended signer>[&p=<flat json object>]
//! ```
//!
//! Values are percent-encoded with the `encodeURIComponent` unreserved set and pairs always
//! appear in the order above. Keys inside `p` keep the order they were inserted in. The schema
//! is closed: any other key is rejected on parse, new fields require a new `ver`. `id` is the
//! hash of the code, never the code itself.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;

use crate::digest::code_hash;
use crate::error::{ProtocolError, ProtocolResult};

/// Prefix of every protocol meta string.
pub const PROTOCOL_META_PREFIX: &str = "actioncodes:";
/// Meta version produced by this crate.
pub const PROTOCOL_META_VERSION: u32 = 2;
/// Default size guard for `int`, serialized `p` and the complete string.
pub const PROTOCOL_META_MAX_BYTES: usize = 256;

/// Everything `encodeURIComponent` escapes.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Decoded protocol meta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMetaFields {
    /// Meta format version, strictly positive.
    pub ver: u32,
    /// Hash of the code, see [`code_hash`].
    pub id: String,
    /// Pubkey the external transaction must be signed by.
    #[serde(rename = "int")]
    pub intended: String,
    /// Optional flat parameters.
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl ProtocolMetaFields {
    /// Fields for the current meta version.
    #[must_use]
    pub fn new(id: impl Into<String>, intended: impl Into<String>) -> Self {
        Self {
            ver: PROTOCOL_META_VERSION,
            id: id.into(),
            intended: intended.into(),
            params: None,
        }
    }

    /// Attaches flat parameters.
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// The fields as they are encoded and compared: `id` and `int` in NFC, trimmed.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            ver: self.ver,
            id: normalize(&self.id),
            intended: normalize(&self.intended),
            params: self.params.clone(),
        }
    }
}

fn normalize(value: &str) -> String {
    value.nfc().collect::<String>().trim().to_string()
}

fn too_large(field: &str, max: usize, actual: usize) -> ProtocolError {
    ProtocolError::MetaTooLarge {
        field: field.to_string(),
        max: u64::try_from(max).unwrap_or(u64::MAX),
        actual: u64::try_from(actual).unwrap_or(u64::MAX),
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

fn serialize_params(params: &Map<String, Value>) -> ProtocolResult<String> {
    if let Some((key, _)) = params
        .iter()
        .find(|(_, value)| value.is_object() || value.is_array())
    {
        return Err(ProtocolError::invalid_meta(format!(
            "`p.{key}` must be a scalar"
        )));
    }
    serde_json::to_string(params).map_err(|e| ProtocolError::invalid_meta(e.to_string()))
}

/// Encodes `fields` under the default size guard.
///
/// # Errors
/// See [`build_protocol_meta_with_limit`].
pub fn build_protocol_meta(fields: &ProtocolMetaFields) -> ProtocolResult<String> {
    build_protocol_meta_with_limit(fields, PROTOCOL_META_MAX_BYTES)
}

/// Encodes `fields`, bounding `int`, the serialized `p` and the output to `max_bytes` each.
///
/// # Errors
/// - `InvalidMetaFormat` for `ver == 0` or a `p` holding objects or arrays.
/// - `MissingRequiredField` for an empty `id` or `int`.
/// - `MetaTooLarge` naming `int`, `p` or `meta` when a bound is exceeded.
pub fn build_protocol_meta_with_limit(
    fields: &ProtocolMetaFields,
    max_bytes: usize,
) -> ProtocolResult<String> {
    let fields = fields.normalized();
    if fields.ver == 0 {
        return Err(ProtocolError::invalid_meta("`ver` must be a positive integer"));
    }
    if fields.id.is_empty() {
        return Err(ProtocolError::missing_field("id"));
    }
    if fields.intended.is_empty() {
        return Err(ProtocolError::missing_field("int"));
    }
    if fields.intended.len() > max_bytes {
        return Err(too_large("int", max_bytes, fields.intended.len()));
    }

    let mut meta = format!(
        "{PROTOCOL_META_PREFIX}ver={}&id={}&int={}",
        fields.ver,
        encode(&fields.id),
        encode(&fields.intended)
    );
    if let Some(params) = &fields.params {
        let params = serialize_params(params)?;
        if params.len() > max_bytes {
            return Err(too_large("p", max_bytes, params.len()));
        }
        meta.push_str("&p=");
        meta.push_str(&encode(&params));
    }

    if meta.len() > max_bytes {
        return Err(too_large("meta", max_bytes, meta.len()));
    }
    Ok(meta)
}

/// Meta for `code` at the current version, with `id` set to the code's hash.
///
/// # Errors
/// Returns `MissingRequiredField` for an empty code, otherwise see [`build_protocol_meta`].
pub fn build_protocol_meta_for_code(
    code: &str,
    intended: &str,
    params: Option<Map<String, Value>>,
) -> ProtocolResult<String> {
    if code.is_empty() {
        return Err(ProtocolError::missing_field("code"));
    }
    build_protocol_meta(&ProtocolMetaFields {
        ver: PROTOCOL_META_VERSION,
        id: code_hash(code),
        intended: intended.to_string(),
        params,
    })
}

/// Decodes a meta string under the default size guard.
///
/// # Errors
/// See [`parse_protocol_meta_with_limit`].
pub fn parse_protocol_meta(input: &str) -> ProtocolResult<ProtocolMetaFields> {
    parse_protocol_meta_with_limit(input, PROTOCOL_META_MAX_BYTES)
}

fn check_percent_encoding(raw: &str) -> ProtocolResult<()> {
    let bytes = raw.as_bytes();
    for (i, _) in bytes.iter().enumerate().filter(|&(_, &b)| b == b'%') {
        let valid = bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(ProtocolError::invalid_meta(format!(
                "bad percent-encoding at byte {i}"
            )));
        }
    }
    Ok(())
}

fn decode(key: &str, raw: &str) -> ProtocolResult<String> {
    check_percent_encoding(raw)?;
    percent_decode_str(raw)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| ProtocolError::invalid_meta(format!("`{key}` is not valid utf-8")))
}

fn parse_ver(value: &str) -> ProtocolResult<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::invalid_meta("`ver` must be a positive integer"));
    }
    match value.parse::<u32>() {
        Ok(ver) if ver > 0 => Ok(ver),
        _ => Err(ProtocolError::invalid_meta("`ver` must be a positive integer")),
    }
}

fn parse_params(value: &str) -> ProtocolResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(value) {
        Ok(Value::Object(params)) => {
            serialize_params(&params)?;
            Ok(params)
        }
        Ok(_) => Err(ProtocolError::invalid_meta("`p` must be a json object")),
        Err(e) => Err(ProtocolError::invalid_meta(format!("`p` is not json: {e}"))),
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> ProtocolResult<()> {
    if slot.is_some() {
        return Err(ProtocolError::invalid_meta(format!("duplicate key `{key}`")));
    }
    *slot = Some(value);
    Ok(())
}

/// Decodes a meta string, bounding its size to `max_bytes`.
///
/// The result is normalized and re-encoded before it is returned, so anything accepted here
/// also builds under the same guard.
///
/// # Errors
/// - `MissingMeta` for empty input.
/// - `MetaTooLarge` when the input or its re-encoding exceeds the guard.
/// - `InvalidMetaFormat` for a wrong prefix, malformed pairs or percent-encoding, duplicate or
///   unknown keys, a bad `ver` or a bad `p`.
/// - `MissingRequiredField` when `ver`, `id` or `int` is absent.
pub fn parse_protocol_meta_with_limit(
    input: &str,
    max_bytes: usize,
) -> ProtocolResult<ProtocolMetaFields> {
    if input.trim().is_empty() {
        return Err(ProtocolError::MissingMeta);
    }
    if input.len() > max_bytes {
        return Err(too_large("meta", max_bytes, input.len()));
    }
    let body = input
        .strip_prefix(PROTOCOL_META_PREFIX)
        .ok_or_else(|| ProtocolError::invalid_meta("missing `actioncodes:` prefix"))?;

    let (mut ver, mut id, mut intended, mut params) = (None, None, None, None);
    for pair in body.split('&').filter(|_| !body.is_empty()) {
        let (key, raw) = pair
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| ProtocolError::invalid_meta(format!("malformed pair `{pair}`")))?;
        let value = decode(key, raw)?;
        match key {
            "ver" => set_once(&mut ver, key, parse_ver(&value)?)?,
            "id" => set_once(&mut id, key, value)?,
            "int" => set_once(&mut intended, key, value)?,
            "p" => set_once(&mut params, key, parse_params(&value)?)?,
            other => {
                log::debug!("rejecting protocol meta with unknown key");
                return Err(ProtocolError::invalid_meta(format!("unknown key `{other}`")));
            }
        }
    }

    let fields = ProtocolMetaFields {
        ver: ver.ok_or_else(|| ProtocolError::missing_field("ver"))?,
        id: id.ok_or_else(|| ProtocolError::missing_field("id"))?,
        intended: intended.ok_or_else(|| ProtocolError::missing_field("int"))?,
        params,
    }
    .normalized();
    build_protocol_meta_with_limit(&fields, max_bytes)?;
    Ok(fields)
}

/// Whether `input` parses as protocol meta.
#[must_use]
pub fn is_protocol_meta(input: &str) -> bool {
    parse_protocol_meta(input).is_ok()
}

fn mismatch(field: &str, expected: String, actual: String) -> ProtocolError {
    ProtocolError::MetaMismatch {
        field: field.to_string(),
        expected,
        actual,
    }
}

/// Checks that `meta` was built for `code` and names `expected_intended` as signer.
///
/// # Errors
/// - Any parse error.
/// - `MetaMismatch` naming `ver`, `id` or `int`, with expected and actual values.
pub fn validate_meta_for_code(
    meta: &str,
    code: &str,
    expected_intended: &str,
) -> ProtocolResult<ProtocolMetaFields> {
    let fields = parse_protocol_meta(meta)?;
    if fields.ver != PROTOCOL_META_VERSION {
        return Err(mismatch(
            "ver",
            PROTOCOL_META_VERSION.to_string(),
            fields.ver.to_string(),
        ));
    }
    let expected_id = code_hash(code);
    if fields.id != expected_id {
        return Err(mismatch("id", expected_id, fields.id));
    }
    let expected_intended = normalize(expected_intended);
    if fields.intended != expected_intended {
        return Err(mismatch("int", expected_intended, fields.intended));
    }
    Ok(fields)
}
