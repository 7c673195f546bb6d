use crate::domain_model::UserId;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token invalid")]
    TokenInvalid,
    #[error("store error: {0}")]
    Store(String),
}

/// Resolves a bearer token, issued elsewhere, to the user it belongs to.
#[async_trait::async_trait]
pub trait AccessTokenVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError>;
}
