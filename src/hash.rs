//! BLAKE3 content tokens for bundle validation
//!
//! The manifest records one token per concrete bundle name. Remote fetches
//! recompute the token over the downloaded bytes and compare; local reads are
//! never validated. Manifest artifacts carry no token at all, since no prior
//! manifest exists to supply one.

use blake3::Hasher;

/// Hash prefix for BLAKE3 content tokens
pub const HASH_PREFIX: &str = "blake3:";

/// Calculate the content token of an artifact payload.
pub fn content_token(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex())
}

/// Check a payload against an expected token.
///
/// Tokens without the `blake3:` prefix never match; a manifest produced by a
/// different tool is treated as a mismatch, not trusted blindly.
pub fn matches_token(bytes: &[u8], expected: &str) -> bool {
    expected.starts_with(HASH_PREFIX) && content_token(bytes) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_prefixed_and_stable() {
        let token = content_token(b"bundle payload");
        assert!(token.starts_with(HASH_PREFIX));
        assert_eq!(token, content_token(b"bundle payload"));
    }

    #[test]
    fn test_matching_roundtrip() {
        let token = content_token(b"abc");
        assert!(matches_token(b"abc", &token));
        assert!(!matches_token(b"abd", &token));
    }

    #[test]
    fn test_unprefixed_token_never_matches() {
        let bare = content_token(b"abc").replace(HASH_PREFIX, "");
        assert!(!matches_token(b"abc", &bare));
    }
}
