// ─────────────────────────────────────────────────────────────────────────────
//  ruyi :: checksum
//
//  Streaming SHA-256 / SHA-512 verification. One pass over the input
//  updates every requested digest; the first disagreement fails the check.
// ─────────────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;
use std::io::Read;

use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 64 * 1024;

enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn new(algo: &str) -> Result<Self> {
        match algo {
            "sha256" => Ok(Hasher::Sha256(Sha256::new())),
            "sha512" => Ok(Hasher::Sha512(Sha512::new())),
            other => Err(Error::UnsupportedChecksumAlgo(other.to_owned())),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(chunk),
            Hasher::Sha512(h) => h.update(chunk),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hex digest length for a supported algorithm.
pub fn expected_hex_len(algo: &str) -> Option<usize> {
    match algo {
        "sha256" => Some(64),
        "sha512" => Some(128),
        _ => None,
    }
}

pub fn is_supported_algo(algo: &str) -> bool {
    expected_hex_len(algo).is_some()
}

/// Compute hex digests of `reader` for every algorithm in `algos`,
/// reading the stream exactly once.
pub fn compute<R: Read>(mut reader: R, algos: &[&str]) -> Result<BTreeMap<String, String>> {
    let mut hashers: Vec<(String, Hasher)> = Vec::with_capacity(algos.len());
    for algo in algos {
        hashers.push(((*algo).to_owned(), Hasher::new(algo)?));
    }

    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for (_, h) in hashers.iter_mut() {
            h.update(&buf[..n]);
        }
    }

    Ok(hashers
        .into_iter()
        .map(|(algo, h)| (algo, h.finalize_hex()))
        .collect())
}

/// Verify `reader` against the expected `algo → hex` map, failing with
/// `ChecksumMismatch` on the first disagreement.
pub fn check<R: Read>(reader: R, checksums: &BTreeMap<String, String>) -> Result<()> {
    let algos: Vec<&str> = checksums.keys().map(String::as_str).collect();
    let computed = compute(reader, &algos)?;

    for (algo, want) in checksums {
        let got = &computed[algo];
        if !want.eq_ignore_ascii_case(got) {
            return Err(Error::ChecksumMismatch {
                algo: algo.clone(),
                want: want.clone(),
                got: got.clone(),
            });
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // printf 'hello' | sha256sum / sha512sum
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
    const HELLO_SHA512: &str = "9b71d224bd62f3785d96d46ad3ea3d73319bfbc2890caadae2dff72519673ca72323c3d99ba5c11d7c7acc6e14b8c5da0c4663475c2e5c3adef46f73bcdec043";

    #[test]
    fn computes_both_digests_in_one_pass() {
        let out = compute(&b"hello"[..], &["sha256", "sha512"]).unwrap();
        assert_eq!(out["sha256"], HELLO_SHA256);
        assert_eq!(out["sha512"], HELLO_SHA512);
    }

    #[test]
    fn check_passes_on_match() {
        let mut want = BTreeMap::new();
        want.insert("sha256".to_owned(), HELLO_SHA256.to_owned());
        check(&b"hello"[..], &want).unwrap();
    }

    #[test]
    fn check_reports_the_failing_algo() {
        let mut want = BTreeMap::new();
        want.insert("sha256".to_owned(), "00".repeat(32));
        let err = check(&b"hello"[..], &want).unwrap_err();
        match err {
            Error::ChecksumMismatch { algo, got, .. } => {
                assert_eq!(algo, "sha256");
                assert_eq!(got, HELLO_SHA256);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_algo_is_rejected() {
        assert!(matches!(
            compute(&b""[..], &["md5"]),
            Err(Error::UnsupportedChecksumAlgo(_))
        ));
    }
}
