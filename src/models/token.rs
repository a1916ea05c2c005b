use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Prefix of generated bearer tokens.
pub const TOKEN_PREFIX: &str = "scim_";

/// Generate a new bearer token.
///
/// Returns a tuple of (raw_token, token_hash) where:
/// - raw_token is handed to the identity provider (shown once)
/// - token_hash is the SHA-256 hex digest that goes into `[[auth.tokens]]`
pub fn generate_token() -> (String, String) {
    // 32 random bytes (256 bits of entropy)
    let mut rng = rand::thread_rng();
    let mut random_bytes = [0u8; 32];
    rng.fill(&mut random_bytes);

    let random_part = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);
    let raw_token = format!("{}{}", TOKEN_PREFIX, random_part);
    let token_hash = hash_token(&raw_token);

    (raw_token, token_hash)
}

/// Hash a bearer token using SHA-256.
///
/// Returns the lowercase hex-encoded digest.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two token digests in constant time.
pub fn digests_match(computed: &str, stored: &str) -> bool {
    computed.as_bytes().ct_eq(stored.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_known_value() {
        assert_eq!(
            hash_token("test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_generate_token() {
        let (raw, hash) = generate_token();
        assert!(raw.starts_with(TOKEN_PREFIX));
        // 32 bytes in base64 without padding is 43 characters
        assert_eq!(raw.len(), TOKEN_PREFIX.len() + 43);
        assert_eq!(hash, hash_token(&raw));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let (a, _) = generate_token();
        let (b, _) = generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_digests_match() {
        let hash = hash_token("secret");
        assert!(digests_match(&hash, &hash_token("secret")));
        assert!(!digests_match(&hash, &hash_token("other")));
        assert!(!digests_match(&hash, ""));
    }
}
