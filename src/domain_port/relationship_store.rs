use crate::application_port::*;
use crate::domain_model::*;

/// Mutation applied to a single user record inside [`RelationshipStore::atomic_update`].
///
/// Stores may call it more than once when a concurrent write wins the race, so
/// it must be a pure function of the record it is given. Returning an error
/// aborts the update and nothing is written.
pub type RecordMutation<'a> = dyn Fn(&mut UserRecord) -> Result<(), FriendshipError> + Send + Sync + 'a;

/// Both sides of one committed record update.
#[derive(Debug, Clone)]
pub struct RecordUpdate {
    pub before: UserRecord,
    pub after: UserRecord,
}

#[async_trait::async_trait]
pub trait RelationshipStore: Send + Sync {
    /// `FriendshipError::NotFound` when the id does not resolve.
    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, FriendshipError>;

    /// Atomic read-modify-write of one record.
    ///
    /// Fails with `NotFound` if the record does not exist and with
    /// `ConflictRetryExhausted` when concurrent writers keep winning.
    async fn atomic_update(
        &self,
        user_id: UserId,
        mutation: &RecordMutation<'_>,
    ) -> Result<RecordUpdate, FriendshipError>;
}
