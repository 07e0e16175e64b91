//! PBKDF2-HMAC-SHA256 password hashes.
//!
//! Stored format: `PBKDF2$<iterations>$<base64 salt>$<base64 key>`. A five-part
//! form with one leading segment (`<prefix>$PBKDF2$...`) is also accepted.

use base64::{Engine, engine::general_purpose::STANDARD};
use pbkdf2::pbkdf2_hmac;
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const DEFAULT_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const ALGORITHM: &str = "PBKDF2";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("malformed password hash")]
    Format,
    #[error("unsupported password hash algorithm")]
    Algorithm,
    #[error("password does not match")]
    Mismatch,
}

/// Hash a password with a fresh random salt.
#[must_use]
pub fn hash_password(password: &str, iterations: u32) -> String {
    let iterations = iterations.max(1);
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut key);

    format!(
        "{ALGORITHM}${iterations}${}${}",
        STANDARD.encode(salt),
        STANDARD.encode(key)
    )
}

/// Check a password against a stored hash.
///
/// The derived key has the stored key's length and is compared in constant time.
///
/// # Errors
/// `Mismatch` for a wrong password, `Format`/`Algorithm` when the stored value is unusable.
pub fn verify_password(password: &str, stored: &str) -> Result<(), PasswordError> {
    let parts: Vec<&str> = stored.trim().split('$').collect();
    let parts = match parts.len() {
        4 => &parts[..],
        5 => &parts[1..],
        _ => return Err(PasswordError::Format),
    };

    if !parts[0].eq_ignore_ascii_case(ALGORITHM) {
        return Err(PasswordError::Algorithm);
    }
    let iterations: u32 = parts[1].parse().map_err(|_| PasswordError::Format)?;
    if iterations == 0 {
        return Err(PasswordError::Format);
    }
    let salt = STANDARD.decode(parts[2]).map_err(|_| PasswordError::Format)?;
    let expected = STANDARD.decode(parts[3]).map_err(|_| PasswordError::Format)?;
    if expected.is_empty() {
        return Err(PasswordError::Format);
    }

    let mut actual = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut actual);

    if bool::from(actual.ct_eq(&expected)) {
        Ok(())
    } else {
        Err(PasswordError::Mismatch)
    }
}
