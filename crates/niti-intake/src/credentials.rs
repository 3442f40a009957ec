//! Password hashing and login.

use bcrypt::{hash, verify, DEFAULT_COST};
use tracing::info;

use niti_core::{Error, Result};
use niti_store::{AuthSession, SqliteStore};

const INVALID_LOGIN: &str = "Invalid email or password";

pub fn hash_password(password: &str) -> Result<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| Error::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    verify(password, password_hash)
        .map_err(|e| Error::Internal(format!("password verification failed: {}", e)))
}

/// Check credentials and open a session that lives for `ttl`.
///
/// Unknown emails and wrong passwords fail the same way.
pub fn login(
    store: &SqliteStore,
    email: &str,
    password: &str,
    ttl: chrono::Duration,
) -> Result<AuthSession> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(Error::Unauthorized(INVALID_LOGIN.into()));
    }

    let Some(password_hash) = store.get_password_hash(email)? else {
        return Err(Error::Unauthorized(INVALID_LOGIN.into()));
    };
    if !verify_password(password, &password_hash)? {
        return Err(Error::Unauthorized(INVALID_LOGIN.into()));
    }

    let session = store.create_session(email, ttl)?;
    info!("Opened session for {}", email);
    Ok(session)
}
