use crate::domain_model::*;
use serde::Serialize;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FriendshipError {
    #[error("user not found: {0}")]
    NotFound(UserId),
    #[error("invalid relationship state: {0}")]
    InvalidState(StateMismatch),
    #[error("a user cannot befriend themselves")]
    SelfReference,
    #[error("partial failure: changes on {applied:?} kept after {failed} failed: {cause}")]
    PartialFailure {
        applied: Vec<UserId>,
        failed: UserId,
        cause: String,
    },
    #[error("too many concurrent updates on {0}, retry later")]
    ConflictRetryExhausted(UserId),
    #[error("store error: {0}")]
    Store(String),
}

impl From<StateMismatch> for FriendshipError {
    fn from(mismatch: StateMismatch) -> Self {
        FriendshipError::InvalidState(mismatch)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendshipOutcome {
    pub user: ProfileSummary,
    pub state: PairState,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationsView {
    pub friends: Vec<ProfileSummary>,
    pub incoming_requests: Vec<ProfileSummary>,
    pub outgoing_requests: Vec<ProfileSummary>,
}

#[async_trait::async_trait]
pub trait FriendshipService: Send + Sync {
    async fn request_friendship(
        &self,
        initiator: UserId,
        target: UserId,
    ) -> Result<FriendshipOutcome, FriendshipError>;
    async fn accept_friendship(
        &self,
        accepter: UserId,
        requester: UserId,
    ) -> Result<FriendshipOutcome, FriendshipError>;
    async fn deny_friendship(
        &self,
        denied_by: UserId,
        requester: UserId,
    ) -> Result<FriendshipOutcome, FriendshipError>;
    async fn unfollow(
        &self,
        initiator: UserId,
        other: UserId,
    ) -> Result<FriendshipOutcome, FriendshipError>;
    async fn relation_state(&self, me: UserId, other: UserId)
    -> Result<PairState, FriendshipError>;
    async fn list_relations(&self, me: UserId) -> Result<RelationsView, FriendshipError>;
}
