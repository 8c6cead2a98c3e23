/// Password Hashing and Verification
///
/// Credential Verifier backed by bcrypt. bcrypt salts every hash and compares
/// digests in constant time.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Hash a secret with bcrypt at `cost`
///
/// Callers validate the secret first (see `validators::validate_password`).
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a presented secret against a stored hash
///
/// Fails closed: a malformed or foreign hash is reported as a mismatch, never
/// as a distinguishable error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match verify(password, stored_hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be checked");
            false
        }
    }
}
