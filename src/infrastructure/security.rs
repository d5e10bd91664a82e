// Password hashing and auth token lookup
//
// Tokens are issued by the external auth service; this side only resolves them.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::UserId;

/// Hash password securely using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verify password against hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn user_for_token(pool: &SqlitePool, key: &str) -> AppResult<Option<UserId>> {
    let user_id = sqlx::query_scalar::<_, i64>("SELECT user_id FROM auth_tokens WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(user_id)
}
