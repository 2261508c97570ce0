//! Password hashing and strength checks.
//!
//! Passwords are hashed with Argon2id and a per-hash salt; the output is a
//! self-describing PHC string, so parameters can be tuned without breaking
//! stored hashes. Verification goes through `argon2::PasswordVerifier` and is
//! constant-time.

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;

const MIN_PASSWORD_LEN: usize = 8;

/// Hash a plaintext password into a PHC string.
///
/// # Errors
/// Returns an error if the underlying KDF fails.
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|_| anyhow!("failed to hash password"))?
        .to_string();
    Ok(hash)
}

/// Compare a plaintext password against a stored PHC hash.
///
/// An unparsable stored hash counts as a mismatch rather than an error, so
/// login flows treat corrupt records like wrong passwords.
#[must_use]
pub fn compare_with_hash(stored: &str, plain: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

/// Password policy: length >= 8 and at least three of
/// {lowercase, uppercase, digit, non-alphanumeric}.
#[must_use]
pub fn check_password_format(password: &str) -> bool {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return false;
    }

    let mut lower = false;
    let mut upper = false;
    let mut digit = false;
    let mut other = false;
    for ch in password.chars() {
        if ch.is_lowercase() {
            lower = true;
        } else if ch.is_uppercase() {
            upper = true;
        } else if ch.is_ascii_digit() {
            digit = true;
        } else {
            other = true;
        }
    }

    [lower, upper, digit, other].into_iter().filter(|v| *v).count() >= 3
}

#[cfg(test)]
mod tests {
    use super::{check_password_format, compare_with_hash, hash_password};

    #[test]
    fn hash_and_compare_round_trip() {
        let hash = hash_password("P@ssw0rd-1").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(compare_with_hash(&hash, "P@ssw0rd-1"));
        assert!(!compare_with_hash(&hash, "p@ssw0rd-1"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let first = hash_password("P@ssw0rd-1").expect("hash");
        let second = hash_password("P@ssw0rd-1").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn compare_with_garbage_hash_is_false() {
        assert!(!compare_with_hash("not-a-phc-string", "P@ssw0rd-1"));
    }

    #[test]
    fn password_format_accepts_three_classes() {
        assert!(check_password_format("P@ssw0rd-1"));
        assert!(check_password_format("lowerUPPER1"));
        assert!(check_password_format("lower-Upper!"));
        assert!(check_password_format("NOLOWER-123"));
    }

    #[test]
    fn password_format_rejects_short_or_uniform() {
        assert!(!check_password_format("Sh0rt!"));
        assert!(!check_password_format("alllowercase"));
        assert!(!check_password_format("alllower123"));
        assert!(!check_password_format("12345678"));
    }
}
