//! Random token generation

use rand::Rng;

/// Characters a run token is drawn from
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random lowercase alphanumeric token.
///
/// Used for the `$%rand%$` placeholder so that concurrently running stress
/// sessions compile into distinct binaries.
pub fn generate_token(length: usize) -> String {
    let mut rng = rand::rng();

    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token1 = generate_token(32);
        let token2 = generate_token(32);

        assert_eq!(token1.len(), 32);
        assert_eq!(token2.len(), 32);
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_token_charset() {
        let token = generate_token(64);
        assert!(token
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_empty_token() {
        assert!(generate_token(0).is_empty());
    }
}
