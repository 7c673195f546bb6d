use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::fmt;

/// Process-local relationship store.
///
/// Each record lives behind its dashmap shard lock, which makes every
/// `atomic_update` serializable per record without retries.
pub struct MemoryRelationshipStore {
    users: DashMap<UserId, UserRecord>,
}

impl fmt::Debug for MemoryRelationshipStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRelationshipStore")
            .field("users", &self.users.len())
            .finish()
    }
}

impl Default for MemoryRelationshipStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRelationshipStore {
    pub fn new() -> Self {
        MemoryRelationshipStore {
            users: DashMap::new(),
        }
    }

    /// Seeds a record, replacing any previous one with the same id.
    pub fn insert_user(&self, record: UserRecord) {
        self.users.insert(record.user_id, record);
    }

    /// Drops a record without touching the records that still point at it.
    pub fn remove_user(&self, user_id: UserId) -> Option<UserRecord> {
        self.users.remove(&user_id).map(|(_, record)| record)
    }

    fn update_in_place(
        &self,
        user_id: UserId,
        mutation: &RecordMutation<'_>,
    ) -> Result<RecordUpdate, FriendshipError> {
        let mut entry = self
            .users
            .get_mut(&user_id)
            .ok_or(FriendshipError::NotFound(user_id))?;

        let before = UserRecord::clone(&entry);
        let mut after = before.clone();
        mutation(&mut after)?;
        *entry = after.clone();

        Ok(RecordUpdate { before, after })
    }
}

#[async_trait::async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, FriendshipError> {
        self.users
            .get(&user_id)
            .map(|entry| UserRecord::clone(&entry))
            .ok_or(FriendshipError::NotFound(user_id))
    }

    async fn atomic_update(
        &self,
        user_id: UserId,
        mutation: &RecordMutation<'_>,
    ) -> Result<RecordUpdate, FriendshipError> {
        self.update_in_place(user_id, mutation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejected_mutation_writes_nothing() {
        let store = MemoryRelationshipStore::new();
        let alice = UserRecord::new(UserId::new_v4(), "alice");
        let other = UserId::new_v4();
        store.insert_user(alice.clone());

        let result = store
            .atomic_update(alice.user_id, &|record: &mut UserRecord| {
                record.relations.friends.insert(other);
                Err(FriendshipError::Store("rejected".to_string()))
            })
            .await;

        assert!(matches!(result, Err(FriendshipError::Store(_))));
        let stored = store.get_user(alice.user_id).await.unwrap();
        assert!(stored.relations.friends.is_empty());
    }

    #[tokio::test]
    async fn update_returns_both_versions() {
        let store = MemoryRelationshipStore::new();
        let alice = UserRecord::new(UserId::new_v4(), "alice");
        let other = UserId::new_v4();
        store.insert_user(alice.clone());

        let update = store
            .atomic_update(alice.user_id, &|record: &mut UserRecord| {
                record.relations.outgoing_requests.insert(other);
                Ok(())
            })
            .await
            .unwrap();

        assert!(update.before.relations.outgoing_requests.is_empty());
        assert!(update.after.relations.outgoing_requests.contains(&other));
        let stored = store.get_user(alice.user_id).await.unwrap();
        assert_eq!(stored.relations, update.after.relations);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = MemoryRelationshipStore::new();
        let ghost = UserId::new_v4();

        assert!(matches!(
            store.get_user(ghost).await,
            Err(FriendshipError::NotFound(id)) if id == ghost
        ));
        let result = store
            .atomic_update(ghost, &|_: &mut UserRecord| Ok(()))
            .await;
        assert!(matches!(result, Err(FriendshipError::NotFound(id)) if id == ghost));
    }
}
