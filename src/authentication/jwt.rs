use chrono::{Duration, Local};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{config::ConfigError, database::schema::User, error::ApiError, schema::Id};

const INVALID_TOKEN: &str = "Invalid token.";
const EXPIRED_TOKEN: &str = "Token has expired.";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, email: String, ttl: Duration) -> Self {
        let now = Local::now();

        Self {
            user_id: id,
            email,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Local::now().timestamp()
    }
}

/// Signing key and lifetime of issued session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Result<Self, ConfigError> {
        let key = Hmac::new_from_slice(secret.as_bytes()).map_err(|e| ConfigError::Invalid {
            key: "JWT_SECRET",
            reason: e.to_string(),
        })?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                reason: String::from("must be positive"),
            });
        }

        Ok(Self {
            key,
            ttl: Duration::hours(ttl_hours),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Id,
    pub email: String,
}

impl From<User> for SessionData {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
        }
    }
}

pub fn generate_jwt_session(keys: &SessionKeys, user: &User) -> Result<String, ApiError> {
    JwtSessionData::new(user.id, user.email.to_owned(), keys.ttl)
        .sign_with_key(&keys.key)
        .map_err(|e| ApiError::Internal(format!("Token signing failed: {e}")))
}

pub fn verify_jwt_session(keys: &SessionKeys, token: &str) -> Result<JwtSessionData, ApiError> {
    let session: JwtSessionData = token
        .verify_with_key(&keys.key)
        .map_err(|_| ApiError::Unauthenticated(INVALID_TOKEN))?;

    if session.is_expired() {
        return Err(ApiError::Unauthenticated(EXPIRED_TOKEN));
    }

    Ok(session)
}
