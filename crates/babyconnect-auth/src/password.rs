//! Password digests.
//!
//! New digests are PBKDF2-HMAC-SHA256 with a per-account random salt, stored
//! as `pbkdf2$<iterations>$<base64 salt>$<base64 hash>`. The iteration count
//! travels with the digest so it can be raised later without invalidating
//! existing accounts.
//!
//! Accounts created by earlier releases (or restored from their backups)
//! carry a bare hex SHA-256 of the password. Those still verify, and
//! [`is_legacy`] tells the caller to re-hash on the next successful login.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{constant_time, digest, pbkdf2};

use crate::error::{AuthError, AuthResult};

/// PBKDF2-HMAC-SHA256 with 600,000 iterations (OWASP 2023).
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Salt length in bytes.
const SALT_LEN: usize = 32;

/// Derived key length in bytes.
const KEY_LEN: usize = 32;

const SCHEME: &str = "pbkdf2";

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str, iterations: NonZeroU32) -> AuthResult<String> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| AuthError::Crypto {
            reason: "failed to generate random salt".into(),
        })?;

    let mut hash = [0u8; KEY_LEN];
    pbkdf2::derive(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &mut hash);

    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        BASE64.encode(salt),
        BASE64.encode(hash)
    ))
}

/// Check `password` against a stored digest of either format.
pub fn verify_password(password: &str, stored: &str) -> AuthResult<bool> {
    if is_legacy(stored) {
        let candidate = legacy_digest(password);
        let expected = stored.to_ascii_lowercase();
        return Ok(
            constant_time::verify_slices_are_equal(candidate.as_bytes(), expected.as_bytes())
                .is_ok(),
        );
    }

    let malformed = || AuthError::Crypto {
        reason: "malformed password digest".into(),
    };
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(malformed());
    };

    let iterations: NonZeroU32 = iterations.parse().map_err(|_| malformed())?;
    let salt = BASE64.decode(salt).map_err(|e| AuthError::Crypto {
        reason: format!("invalid salt encoding: {e}"),
    })?;
    let expected = BASE64.decode(hash).map_err(|e| AuthError::Crypto {
        reason: format!("invalid hash encoding: {e}"),
    })?;

    Ok(pbkdf2::verify(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &expected).is_ok())
}

/// Whether `stored` is an unsalted hex SHA-256 digest.
pub fn is_legacy(stored: &str) -> bool {
    stored.len() == 64 && stored.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Unsalted hex SHA-256 of `password`, the format written by early releases.
pub fn legacy_digest(password: &str) -> String {
    let digest = digest::digest(&digest::SHA256, password.as_bytes());
    digest
        .as_ref()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
