use crate::application_port::*;
use crate::domain_model::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, FromRedisValue, RedisError, RedisResult, Value};
use sha2::{Digest, Sha256};

/// Looks up access tokens written by the login service.
///
/// Tokens are keyed by their SHA-256 digest so raw bearer tokens never sit in Redis:
/// `<prefix>:<hex digest>` → user id.
pub struct RedisAccessTokenVerifier {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisAccessTokenVerifier {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisAccessTokenVerifier {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, token: &str) -> String {
        token_key(&self.prefix, token)
    }
}

pub fn token_key(prefix: &str, token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}:{}", prefix, hex::encode(digest))
}

impl FromRedisValue for UserId {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        let user_id = s.parse::<UserId>().map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "invalid UserId string",
                e.to_string(),
            ))
        })?;
        Ok(user_id)
    }
}

#[async_trait::async_trait]
impl AccessTokenVerifier for RedisAccessTokenVerifier {
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        let key = self.key(token);
        let mut conn = self.conn.clone();
        let user_id: Option<UserId> = conn
            .get(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        user_id.ok_or(AuthError::TokenInvalid)
    }
}
