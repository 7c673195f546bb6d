use moody::application_impl::RealFriendshipService;
use moody::domain_model::{UserId, UserRecord, audit_pair};
use moody::domain_port::RelationshipStore;
use moody::infra_memory::MemoryRelationshipStore;
use std::sync::Arc;

pub struct World {
    pub store: Arc<MemoryRelationshipStore>,
    pub service: Arc<RealFriendshipService>,
    pub users: Vec<UserId>,
}

impl World {
    pub fn with_users(names: &[&str]) -> Self {
        let store = Arc::new(MemoryRelationshipStore::new());
        let users = names
            .iter()
            .map(|name| {
                let record = UserRecord::new(UserId::new_v4(), *name);
                let id = record.user_id;
                store.insert_user(record);
                id
            })
            .collect();
        let service = Arc::new(RealFriendshipService::new(store.clone()));
        World {
            store,
            service,
            users,
        }
    }

    pub async fn record(&self, id: UserId) -> UserRecord {
        self.store.get_user(id).await.expect("seeded user")
    }

    /// Panics with every invariant violation found across all pairs.
    pub async fn assert_consistent(&self) {
        let mut records = Vec::with_capacity(self.users.len());
        for id in &self.users {
            records.push(self.record(*id).await);
        }
        let mut violations = Vec::new();
        for (i, a) in records.iter().enumerate() {
            for b in &records[i..] {
                violations.extend(audit_pair(a, b));
            }
        }
        assert!(violations.is_empty(), "invariants violated: {:?}", violations);
    }
}
