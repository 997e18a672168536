//! Hash primitives and the digest to decimal digits derivation.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::{clamp_code_length, MAX_CODE_LENGTH};
use crate::error::{ProtocolError, ProtocolResult};

type HmacSha256 = Hmac<Sha256>;

const DIGITS_PER_WINDOW: usize = 9;
const WINDOW_MODULUS: u32 = 1_000_000_000;

/// SHA-256 of `data`.
#[must_use]
pub fn sha256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Sha256::digest(data.as_ref()).into()
}

/// HMAC-SHA256 of `data` under `key`.
///
/// # Errors
/// Returns `CryptoError` if the key is empty.
pub fn hmac_sha256(key: impl AsRef<[u8]>, data: impl AsRef<[u8]>) -> ProtocolResult<[u8; 32]> {
    let key = key.as_ref();
    if key.is_empty() {
        return Err(ProtocolError::CryptoError {
            reason: "hmac key must not be empty".to_string(),
        });
    }
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| ProtocolError::CryptoError {
        reason: e.to_string(),
    })?;
    mac.update(data.as_ref());
    Ok(mac.finalize().into_bytes().into())
}

/// Keeps the first `total_bits` bits of `digest`.
///
/// Returns `ceil(total_bits / 8)` bytes; when `total_bits` is not byte aligned the unused low
/// bits of the last byte are zeroed.
///
/// # Errors
/// Returns `InvalidDigest` if `total_bits` is zero or exceeds the digest.
pub fn truncate_bits(digest: &[u8], total_bits: usize) -> ProtocolResult<Vec<u8>> {
    if total_bits == 0 || total_bits > digest.len() * 8 {
        return Err(ProtocolError::InvalidDigest {
            reason: format!(
                "cannot keep {total_bits} bits of a {}-bit digest",
                digest.len() * 8
            ),
        });
    }
    let mut out = digest[..total_bits.div_ceil(8)].to_vec();
    let rem = total_bits % 8;
    if rem != 0 {
        if let Some(last) = out.last_mut() {
            *last &= 0xFF << (8 - rem);
        }
    }
    Ok(out)
}

/// Dynamic truncation in the style of HOTP (RFC 4226), extended to arbitrary lengths.
///
/// The starting offset is the low nibble of the last byte. Each step reads four bytes
/// big-endian (wrapping around the digest), masks the top bit, reduces modulo 10^9 and appends
/// the zero-padded nine digits. Steps advance four bytes until `length` digits exist, then the
/// output is cut to exactly `length`. The bias of `2^31 mod 10^9` is accepted.
///
/// # Errors
/// Returns `InvalidDigest` for an empty digest and `InvalidInput` for a length of zero or
/// above [`MAX_CODE_LENGTH`].
pub fn digest_to_digits(digest: &[u8], length: usize) -> ProtocolResult<String> {
    let Some(&last) = digest.last() else {
        return Err(ProtocolError::InvalidDigest {
            reason: "digest is empty".to_string(),
        });
    };
    if length == 0 || length > MAX_CODE_LENGTH as usize {
        return Err(ProtocolError::invalid_input(
            "length",
            format!("code length must be within [1, {MAX_CODE_LENGTH}]"),
        ));
    }

    let len = digest.len();
    let mut cursor = usize::from(last & 0x0F);
    let mut out = String::with_capacity(length + DIGITS_PER_WINDOW);
    while out.len() < length {
        let word = (0..4).fold(0u32, |acc, i| {
            (acc << 8) | u32::from(digest[(cursor + i) % len])
        });
        let value = (word & 0x7FFF_FFFF) % WINDOW_MODULUS;
        out.push_str(&format!("{value:0width$}", width = DIGITS_PER_WINDOW));
        cursor += 4;
    }
    out.truncate(length);
    Ok(out)
}

/// Hex SHA-256 of a code. One-way identifier used wherever the raw code must not appear.
#[must_use]
pub fn code_hash(code: &str) -> String {
    hex::encode(sha256(code))
}

/// Constant-time comparison of two codes.
#[must_use]
pub fn codes_match(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}

/// Derives a code from canonical bytes and the signature over them.
///
/// The digest input is the canonical message followed by the signature's UTF-8 bytes, so a
/// pubkey and window alone never determine the code. With a secret the digest is an HMAC under
/// that secret, otherwise a plain SHA-256. The digest is cut to `8 * ceil(len / 2)` bits before
/// digit extraction.
pub(crate) fn derive_code(
    canonical_message: &[u8],
    signature: &str,
    secret: Option<&str>,
    code_length: u32,
) -> ProtocolResult<String> {
    let length = clamp_code_length(code_length);
    // canonical bytes embed the secret
    let mut material = Zeroizing::new(Vec::with_capacity(
        canonical_message.len() + signature.len(),
    ));
    material.extend_from_slice(canonical_message);
    material.extend_from_slice(signature.as_bytes());

    let digest = Zeroizing::new(match secret {
        Some(secret) => hmac_sha256(secret, material.as_slice())?,
        None => sha256(material.as_slice()),
    });
    let truncated = truncate_bits(digest.as_slice(), 8 * length.div_ceil(2))?;
    digest_to_digits(&truncated, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hmac_sha256_rfc4231_case_2() {
        let mac = hmac_sha256("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        assert!(matches!(
            hmac_sha256("", "data"),
            Err(ProtocolError::CryptoError { .. })
        ));
    }

    #[test]
    fn test_truncate_bits() {
        let digest = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(truncate_bits(&digest, 8).unwrap(), vec![0xFF]);
        assert_eq!(truncate_bits(&digest, 12).unwrap(), vec![0xFF, 0xF0]);
        assert_eq!(truncate_bits(&digest, 1).unwrap(), vec![0x80]);
        assert_eq!(truncate_bits(&digest, 32).unwrap(), digest.to_vec());
        assert!(truncate_bits(&digest, 0).is_err());
        assert!(truncate_bits(&digest, 33).is_err());
    }

    #[test]
    fn test_digest_to_digits_matches_hotp() {
        // RFC 4226 appendix D, count 0: dynamic truncation of this HMAC yields 1284755224.
        let digest = hex::decode("cc93cf18508d94934c64b65d8ba7667fb7cde4b0").unwrap();
        assert_eq!(digest_to_digits(&digest, 9).unwrap(), "284755224");
        assert_eq!(digest_to_digits(&digest, 6).unwrap(), "284755");
    }

    #[test]
    fn test_digest_to_digits_wraps_short_digests() {
        let digest = [0x01, 0x02, 0x03];
        // offset 3 wraps to index 0: word 0x01020301 = 16909057
        assert_eq!(digest_to_digits(&digest, 9).unwrap(), "016909057");
        let long = digest_to_digits(&digest, 24).unwrap();
        assert_eq!(long.len(), 24);
        assert!(long.bytes().all(|b| b.is_ascii_digit()));
        assert!(digest_to_digits(&[], 6).is_err());
        assert!(digest_to_digits(&digest, 0).is_err());
    }

    #[test]
    fn test_digest_to_digits_rejects_oversized_lengths() {
        let digest = [0x01, 0x02, 0x03];
        assert!(matches!(
            digest_to_digits(&digest, 25),
            Err(ProtocolError::InvalidInput { .. })
        ));
        assert!(matches!(
            digest_to_digits(&digest, usize::MAX),
            Err(ProtocolError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_code_hash() {
        assert_eq!(
            code_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_derive_code_depends_on_every_input() {
        let message = b"{\"id\":\"actioncodes\"}";
        let base = derive_code(message, "sigA", None, 8).unwrap();
        assert_eq!(base.len(), 8);
        assert_eq!(base, derive_code(message, "sigA", None, 8).unwrap());
        assert_ne!(base, derive_code(message, "sigB", None, 8).unwrap());
        assert_ne!(base, derive_code(message, "sigA", Some("k"), 8).unwrap());
        assert_eq!(derive_code(message, "sigA", None, 1).unwrap().len(), 6);
        assert_eq!(derive_code(message, "sigA", None, 100).unwrap().len(), 24);
    }

    #[test]
    fn test_derive_code_known_answers() {
        // sha256(canonical || "sigA") cut to 4 bytes is b7b1aab1; offset 1 reads b1aab1b7.
        let canonical =
            br#"{"id":"actioncodes","ver":1,"pubkey":"alice","windowStart":1759737720000}"#;
        assert_eq!(derive_code(canonical, "sigA", None, 8).unwrap(), "83327019");
        assert_eq!(
            derive_code(canonical, "sigA", None, 24).unwrap(),
            "934390449172802958569841"
        );

        // hmac keyed on the secret, over canonical bytes that embed it
        let keyed = concat!(
            r#"{"id":"actioncodes","ver":1,"pubkey":"alice","#,
            r#""windowStart":1759737720000,"secret":"s3cret"}"#
        );
        assert_eq!(
            derive_code(keyed.as_bytes(), "sigA", Some("s3cret"), 8).unwrap(),
            "99921263"
        );
    }

    #[test]
    fn test_codes_match() {
        assert!(codes_match("123456", "123456"));
        assert!(!codes_match("123456", "123457"));
        assert!(!codes_match("123456", "1234567"));
    }
}
