//! Bearer-token authentication
//!
//! Tokens carry the caller's identity, role, and (for employees) their
//! manager. Issuing tokens is not an API operation; `create_token` exists
//! for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::EmployeeId;
use domain_claims::{Actor, Role};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (employee ID)
    pub sub: String,
    /// Single role name
    pub role: String,
    /// The subject's manager, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgr: Option<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),
}

impl Claims {
    /// Resolves the token's subject into a domain actor
    pub fn actor(&self) -> Result<Actor, AuthError> {
        let id: EmployeeId = self
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidSubject(self.sub.clone()))?;
        let role: Role = self
            .role
            .parse()
            .map_err(|_| AuthError::UnknownRole(self.role.clone()))?;

        let actor = Actor::new(id, role);
        match &self.mgr {
            Some(mgr) => {
                let manager_id: EmployeeId = mgr
                    .parse()
                    .map_err(|_| AuthError::InvalidSubject(mgr.clone()))?;
                Ok(actor.with_manager(manager_id))
            }
            None => Ok(actor),
        }
    }
}

/// Creates a new JWT token for an actor
///
/// # Arguments
///
/// * `actor` - Identity, role, and manager to encode
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(actor: &Actor, secret: &str, expiration_secs: u64) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: actor.id.to_string(),
        role: actor.role.as_str().to_string(),
        mgr: actor.manager_id.map(|m| m.to_string()),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// # Arguments
///
/// * `token` - The JWT token to validate
/// * `secret` - JWT secret key
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}
