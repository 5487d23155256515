//! Password hashing.
//!
//! Argon2 is slow on purpose, so both operations run on the blocking pool.

use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};

#[derive(Debug)]
pub enum PasswordError {
    /// Hashing failed or the stored hash is not a valid PHC string
    Hash(String),
    /// The blocking task panicked or was cancelled
    Task(tokio::task::JoinError),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Hash(e) => write!(f, "Password hash error: {}", e),
            PasswordError::Task(e) => write!(f, "Password hashing task failed: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Hash a password into a PHC string with a random salt.
pub async fn hash_password(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(PasswordError::Task)?
}

/// Check a password against a stored PHC hash.
pub async fn verify_password(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_blocking(&password, &hash))
        .await
        .map_err(PasswordError::Task)?
}

/// Spend the same Argon2 work as [`verify_password`] when there is no stored
/// hash to check against, so unknown accounts answer as slowly as known ones.
pub async fn verify_dummy_password(password: String) -> Result<(), PasswordError> {
    tokio::task::spawn_blocking(move || {
        verify_blocking(&password, dummy_hash()?).map(|_| ())
    })
    .await
    .map_err(PasswordError::Task)?
}

fn hash_blocking(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

fn verify_blocking(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hash with the same parameters as real accounts, computed on first use.
fn dummy_hash() -> Result<&'static str, PasswordError> {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();

    if let Some(hash) = DUMMY_HASH.get() {
        return Ok(hash.as_str());
    }
    let hash = hash_blocking("dummy-password-never-matches")?;
    Ok(DUMMY_HASH.get_or_init(|| hash).as_str())
}
