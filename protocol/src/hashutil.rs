use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::{Digest, Sha1};

/// base64(SHA-1(data)) — used for the content-prefix identity check.
pub fn sha1_b64(data: &[u8]) -> String {
    let digest = Sha1::digest(data);
    STANDARD.encode(digest)
}

/// hex(SHA-1(data)) — used for client-token authentication, matching the
/// `--client-token-hash` CLI flag's format.
pub fn sha1_hex(data: &[u8]) -> String {
    let digest = Sha1::digest(data);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String cannot fail");
    }
    out
}

/// Constant-time comparison of two token hashes, so an invalid token can't
/// be brute-forced via response-timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_b64_matches_known_vector() {
        assert_eq!(
            sha1_b64(b"2021-02-22 Hel"),
            "IfIeKvusGDWiGv6o2gqg2Al7b30="
        );
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }
}
