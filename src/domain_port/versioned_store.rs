use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{RecordMutation, RecordUpdate};
use crate::logger::*;

/// Storage that can only write a record back if nobody changed it since it
/// was read. Stores built on it get `atomic_update` through [`update_with_retries`].
#[async_trait::async_trait]
pub trait VersionedRecords: Send + Sync {
    /// The record together with the version it was read at.
    async fn fetch_versioned(&self, user_id: UserId) -> Result<(UserRecord, i64), FriendshipError>;

    /// Writes `record` if the stored version is still `version`.
    /// `Ok(false)` means a concurrent writer got there first.
    async fn compare_and_set(&self, record: &UserRecord, version: i64) -> Result<bool, FriendshipError>;
}

/// Read, mutate, compare-and-set; a lost race re-runs `mutation` against the
/// newer record. Gives up with `ConflictRetryExhausted` after `max_attempts`.
pub async fn update_with_retries<S>(
    store: &S,
    user_id: UserId,
    mutation: &RecordMutation<'_>,
    max_attempts: u32,
) -> Result<RecordUpdate, FriendshipError>
where
    S: VersionedRecords + ?Sized,
{
    let max_attempts = max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let (before, version) = store.fetch_versioned(user_id).await?;
        let mut after = before.clone();
        mutation(&mut after)?;

        if store.compare_and_set(&after, version).await? {
            return Ok(RecordUpdate { before, after });
        }

        debug!(%user_id, attempt, version, "user relation changed concurrently, retrying");
        tokio::task::yield_now().await;
    }

    warn!(%user_id, attempts = max_attempts, "gave up updating user relation");
    Err(FriendshipError::ConflictRetryExhausted(user_id))
}
