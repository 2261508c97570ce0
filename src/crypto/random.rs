//! Random opaque tokens and numeric verification codes.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{Rng, RngCore, rngs::OsRng};

/// Create a 128-bit URL-safe opaque token.
///
/// Used for refresh tokens, temp tokens and invitation tokens. Only the
/// holder ever sees the value; stores index it verbatim.
///
/// # Errors
/// Returns an error if the OS entropy source fails.
pub fn unique_token() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate opaque token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Create an `n`-digit numeric verification code with uniformly chosen digits.
///
/// # Errors
/// Returns an error if the OS entropy source fails.
pub fn verification_code(digits: usize) -> Result<String> {
    let mut code = String::with_capacity(digits);
    for _ in 0..digits {
        let digit: u8 = OsRng.gen_range(0..10);
        code.push(char::from(b'0' + digit));
    }
    Ok(code)
}

/// Format a verification code for display: split at the midpoint with a dash.
#[must_use]
pub fn format_verification_code(code: &str) -> String {
    let half = code.len() / 2;
    format!("{}-{}", &code[..half], &code[half..])
}

#[cfg(test)]
mod tests {
    use super::{format_verification_code, unique_token, verification_code};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn unique_token_is_128_bits_url_safe() {
        let token = unique_token().expect("token");
        let decoded = URL_SAFE_NO_PAD.decode(token.as_bytes()).expect("decode");
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn unique_tokens_differ() {
        let first = unique_token().expect("token");
        let second = unique_token().expect("token");
        assert_ne!(first, second);
    }

    #[test]
    fn verification_code_is_numeric() {
        let code = verification_code(6).expect("code");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|ch| ch.is_ascii_digit()));
    }

    #[test]
    fn format_splits_at_midpoint() {
        assert_eq!(format_verification_code("123456"), "123-456");
        assert_eq!(format_verification_code("12345"), "12-345");
    }
}
