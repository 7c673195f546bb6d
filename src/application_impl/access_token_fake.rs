use crate::application_port::*;
use crate::domain_model::UserId;

#[derive(Debug, Default)]
pub struct FakeAccessTokenVerifier;

impl FakeAccessTokenVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn token_for(user_id: UserId) -> String {
        format!("fake-access-token:{}", user_id)
    }
}

// Accepts `fake-access-token:<user uuid>` and trusts the embedded id.
#[async_trait::async_trait]
impl AccessTokenVerifier for FakeAccessTokenVerifier {
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        token
            .strip_prefix("fake-access-token:")
            .and_then(|id| id.parse::<UserId>().ok())
            .ok_or(AuthError::TokenInvalid)
    }
}
