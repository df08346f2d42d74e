//! Password hashing module
//!
//! Hashes and verifies passwords with PBKDF2-HMAC-SHA256. The stored format
//! is `"<iterations>:<base64 salt>:<base64 derived-key>"`, with a random
//! 16-byte salt and a 32-byte derived key. Both base64 fields must validate
//! independently before a verification attempt; anything malformed verifies
//! as a plain mismatch rather than an error, so login never leaks whether a
//! stored hash was readable.

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

/// PBKDF2 iteration count for newly hashed passwords
const ITERATIONS: u32 = 100_000;
/// Salt length in bytes
const SALT_LEN: usize = 16;
/// Derived key length in bytes
const KEY_LEN: usize = 32;

/// Hash a password with PBKDF2-HMAC-SHA256 and a fresh random salt.
///
/// # Returns
///
/// The hash in `"iterations:saltB64:hashB64"` form.
pub fn hash_password(password: &str) -> Result<String> {
    hash_password_with_iterations(password, ITERATIONS)
}

/// Hash with an explicit iteration count. Exposed so tests can use a cheap
/// count; production paths go through [`hash_password`].
pub fn hash_password_with_iterations(password: &str, iterations: u32) -> Result<String> {
    if iterations == 0 {
        return Err(anyhow!("Iteration count must be positive"));
    }

    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut key);

    Ok(format!(
        "{}:{}:{}",
        iterations,
        BASE64.encode(salt),
        BASE64.encode(key)
    ))
}

/// Verify a password against a stored hash.
///
/// Returns `false` for a wrong password and for any malformed stored hash
/// (wrong field count, non-numeric iteration count, invalid base64).
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let mut parts = stored_hash.split(':');
    let (Some(iterations), Some(salt_b64), Some(hash_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    // Both base64 fields must decode independently
    let Ok(salt) = BASE64.decode(salt_b64) else {
        return false;
    };
    let Ok(expected) = BASE64.decode(hash_b64) else {
        return false;
    };

    let mut derived = vec![0u8; expected.len().max(1)];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);

    constant_time_eq(&derived, &expected)
}

/// Compare two byte slices without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Cheap iteration count for tests; the real count makes suites crawl
    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn test_hash_format() {
        let hash = hash_password_with_iterations("secret", TEST_ITERATIONS).expect("hash");
        let parts: Vec<&str> = hash.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], TEST_ITERATIONS.to_string());
        assert_eq!(BASE64.decode(parts[1]).expect("salt").len(), 16);
        assert_eq!(BASE64.decode(parts[2]).expect("key").len(), 32);
    }

    #[test]
    fn test_same_password_different_hashes() {
        let hash1 = hash_password_with_iterations("secret", TEST_ITERATIONS).expect("hash");
        let hash2 = hash_password_with_iterations("secret", TEST_ITERATIONS).expect("hash");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_correct_and_incorrect() {
        let hash = hash_password_with_iterations("correct horse", TEST_ITERATIONS).expect("hash");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn test_verify_malformed_hashes() {
        assert!(!verify_password("secret", ""));
        assert!(!verify_password("secret", "not a hash"));
        assert!(!verify_password("secret", "100000:onlytwofields"));
        assert!(!verify_password("secret", "100000:a:b:extra"));
        assert!(!verify_password("secret", "NaN:QUJD:QUJD"));
        assert!(!verify_password("secret", "0:QUJD:QUJD"));
        // Invalid base64 in either field
        assert!(!verify_password("secret", "100000:!!!:QUJD"));
        assert!(!verify_password("secret", "100000:QUJD:!!!"));
    }

    #[test]
    fn test_verify_unicode_password() {
        let hash = hash_password_with_iterations("contraseña🎨", TEST_ITERATIONS).expect("hash");
        assert!(verify_password("contraseña🎨", &hash));
        assert!(!verify_password("contrasena", &hash));
    }

    #[test]
    fn test_hash_not_containing_password() {
        let hash = hash_password_with_iterations("my_secret_password", TEST_ITERATIONS)
            .expect("hash");
        assert!(!hash.contains("my_secret_password"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn property_hash_verify_round_trip(password in ".{0,40}") {
            let hash = hash_password_with_iterations(&password, TEST_ITERATIONS).unwrap();
            prop_assert!(verify_password(&password, &hash));
        }

        #[test]
        fn property_wrong_password_fails(password in "[a-z]{4,20}", wrong in "[A-Z]{4,20}") {
            let hash = hash_password_with_iterations(&password, TEST_ITERATIONS).unwrap();
            prop_assert!(!verify_password(&wrong, &hash));
        }
    }
}
