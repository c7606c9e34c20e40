use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Generate a cryptographically random bearer token. The caller hands the
/// encoded form to the client exactly once; only its digest is stored.
pub fn generate_token() -> anyhow::Result<String> {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng
        .try_fill_bytes(&mut buf)
        .context("read random bytes for session token")?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// SHA-256 digest of a presented token, hex-encoded for the `token_hash`
/// column. Lookup by digest means a stolen database never yields a usable
/// bearer token.
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_expected_length() {
        // 32 bytes, base64 url-safe without padding
        let token = generate_token().expect("generate");
        assert_eq!(token.len(), 43);
    }

    #[test]
    fn tokens_are_unique() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_stable_and_hex() {
        let d1 = digest_token("some-token");
        let d2 = digest_token("some-token");
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
        assert!(d1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_differs_per_token() {
        assert_ne!(digest_token("token-a"), digest_token("token-b"));
    }
}
