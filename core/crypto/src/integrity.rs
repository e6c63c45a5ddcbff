//! Hashing and message authentication.
//!
//! SHA-256 digests and HMAC-SHA256 tags. Every comparison of a digest or tag
//! against an expected value runs in constant time.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use diaryvault_common::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Size of a SHA-256 digest and of an HMAC-SHA256 tag (32 bytes).
pub const DIGEST_SIZE: usize = 32;

/// Compute the SHA-256 digest of `data`.
pub fn hash(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&digest);
    out
}

/// Compute the SHA-256 digest of `data` as lowercase hex.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}

/// Check `data` against an expected digest.
///
/// Returns false on any mismatch, including a digest of the wrong length.
pub fn verify_hash(data: &[u8], expected: &[u8]) -> bool {
    if expected.len() != DIGEST_SIZE {
        return false;
    }
    hash(data).ct_eq(expected).into()
}

fn keyed(key: &[u8]) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key)
        .map_err(|e| Error::InvalidInput(format!("Invalid HMAC key: {}", e)))
}

/// Compute the HMAC-SHA256 tag of `data` under `key`.
pub fn hmac(data: &[u8], key: &[u8]) -> Result<[u8; DIGEST_SIZE]> {
    let mut mac = keyed(key)?;
    mac.update(data);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&tag);
    Ok(out)
}

/// Compute the HMAC-SHA256 tag of `data` under `key` as lowercase hex.
pub fn hmac_hex(data: &[u8], key: &[u8]) -> Result<String> {
    Ok(hex::encode(hmac(data, key)?))
}

/// Verify an HMAC-SHA256 tag in constant time.
pub fn verify_hmac(data: &[u8], tag: &[u8], key: &[u8]) -> bool {
    let Ok(mut mac) = keyed(key) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_avalanche() {
        let a = hash(b"dear diary");
        let b = hash(b"dear diary.");
        let differing_bits: u32 = a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum();

        // Roughly half of the 256 bits should flip
        assert!(differing_bits > 64, "only {} bits differ", differing_bits);
    }

    #[test]
    fn test_verify_hash() {
        let digest = hash(b"entry");
        assert!(verify_hash(b"entry", &digest));
        assert!(!verify_hash(b"entry!", &digest));
        assert!(!verify_hash(b"entry", &digest[..16]));
        assert!(!verify_hash(b"entry", &[]));
    }

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2
        let tag = hmac_hex(b"what do ya want for nothing?", b"Jefe").unwrap();
        assert_eq!(
            tag,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_hmac() {
        let key = b"backup-integrity-key";
        let tag = hmac(b"payload", key).unwrap();

        assert!(verify_hmac(b"payload", &tag, key));
        assert!(!verify_hmac(b"payload", &tag, b"other-key"));
        assert!(!verify_hmac(b"Payload", &tag, key));
        assert!(!verify_hmac(b"payload", &tag[..31], key));
    }

    #[test]
    fn test_verify_hmac_detects_any_bit_flip() {
        let key = [3u8; 32];
        let data = b"the quick brown fox".to_vec();
        let tag = hmac(&data, &key).unwrap();

        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut mutated = data.clone();
                mutated[byte] ^= 1 << bit;
                assert!(!verify_hmac(&mutated, &tag, &key));
            }
        }
    }
}
