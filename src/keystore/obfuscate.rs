//! Reversible obfuscation for stored API keys.
//!
//! This is a keystream XOR over the secret's bytes rendered as base64. It
//! hides the key from casual inspection of the stored documents and nothing
//! more: it is not authenticated encryption and must not be described as
//! such anywhere user-facing.

use base64::Engine;
use thiserror::Error;

const MASK_PREFIX_LEN: usize = 8;
const MASK_SUFFIX_LEN: usize = 4;
const MASK_RUN_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum ObfuscationError {
    #[error("stored secret is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

fn xor_with(data: &[u8], passphrase: &str) -> Vec<u8> {
    let key = passphrase.as_bytes();
    data.iter()
        .enumerate()
        .map(|(i, byte)| byte ^ key[i % key.len()])
        .collect()
}

/// XOR each byte of the secret with the cycled passphrase and render the
/// result as standard base64. The passphrase must be non-empty; startup
/// configuration enforces that before this is ever called.
pub fn encode_secret(secret: &str, passphrase: &str) -> String {
    let mixed = xor_with(secret.as_bytes(), passphrase);
    base64::engine::general_purpose::STANDARD.encode(mixed)
}

/// Exact inverse of [`encode_secret`] under the same passphrase. A wrong
/// passphrase does not fail: the XOR simply yields garbage, recovered with
/// lossy UTF-8 so the caller never panics on it.
pub fn decode_secret(encoded: &str, passphrase: &str) -> Result<String, ObfuscationError> {
    let mixed = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    let plain = xor_with(&mixed, passphrase);
    Ok(String::from_utf8_lossy(&plain).into_owned())
}

/// Masked rendering for display: a short visible prefix, a fixed run of `*`,
/// a short visible suffix. Short secrets shrink the visible spans so the
/// mask never reconstructs the full plaintext.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let prefix_len = if chars.len() > MASK_PREFIX_LEN + MASK_SUFFIX_LEN {
        MASK_PREFIX_LEN
    } else {
        chars.len() / 3
    };
    let suffix_len = if chars.len() > MASK_PREFIX_LEN + MASK_SUFFIX_LEN {
        MASK_SUFFIX_LEN
    } else {
        chars.len().saturating_sub(prefix_len * 2).min(prefix_len)
    };
    let prefix: String = chars[..prefix_len].iter().collect();
    let suffix: String = chars[chars.len() - suffix_len..].iter().collect();
    format!("{prefix}{}{suffix}", "*".repeat(MASK_RUN_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_recovers_the_secret() {
        let cases = [
            ("AIzaSyA-abcdefghijklmnop_1234567", "server-passphrase"),
            ("k", "p"),
            ("secret with spaces and ünïcödé", "päss"),
            ("longer-secret-than-the-passphrase-by-far", "ab"),
        ];
        for (secret, passphrase) in cases {
            let encoded = encode_secret(secret, passphrase);
            assert_eq!(decode_secret(&encoded, passphrase).unwrap(), secret);
        }
    }

    #[test]
    fn encoded_form_is_printable_and_differs_from_plaintext() {
        let encoded = encode_secret("AIzaSyA-test-key-000", "passphrase");
        assert!(encoded.is_ascii());
        assert_ne!(encoded, "AIzaSyA-test-key-000");
    }

    #[test]
    fn wrong_passphrase_yields_garbage_not_an_error() {
        let encoded = encode_secret("AIzaSyA-test-key-000", "right-passphrase");
        let garbled = decode_secret(&encoded, "wrong-passphrase").unwrap();
        assert_ne!(garbled, "AIzaSyA-test-key-000");
    }

    #[test]
    fn invalid_base64_is_the_only_decode_error() {
        assert!(decode_secret("!!!not-base64!!!", "p").is_err());
    }

    #[test]
    fn mask_shows_fixed_prefix_and_suffix() {
        let secret = "AIzaSyA-abcdefghijklmnop_1234567";
        let masked = mask_secret(secret);
        assert!(masked.starts_with("AIzaSyA-"));
        assert!(masked.ends_with("4567"));
        assert!(masked.contains("********"));
        assert_ne!(masked, secret);
        assert!(!masked.contains(secret));
    }

    #[test]
    fn short_secrets_are_not_reconstructible_from_the_mask() {
        for secret in ["tiny", "123456789012", "k"] {
            let masked = mask_secret(secret);
            assert!(!masked.contains(secret), "mask leaked {secret:?}: {masked}");
        }
    }
}
