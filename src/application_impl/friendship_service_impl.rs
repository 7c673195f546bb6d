use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One committed single-record step of a saga.
#[derive(Debug, Clone)]
struct AppliedStep {
    owner: UserId,
    other: UserId,
    transition: Transition,
    before: PairState,
    after: PairState,
    record: UserRecord,
}

pub struct RealFriendshipService {
    store: Arc<dyn RelationshipStore>,
}

impl RealFriendshipService {
    pub fn new(store: Arc<dyn RelationshipStore>) -> Self {
        Self { store }
    }

    async fn load_pair(
        &self,
        me: UserId,
        other: UserId,
    ) -> Result<(UserRecord, UserRecord), FriendshipError> {
        if me == other {
            return Err(FriendshipError::SelfReference);
        }
        let mine = self.store.get_user(me).await?;
        let theirs = self.store.get_user(other).await?;
        Ok((mine, theirs))
    }

    async fn step(
        &self,
        owner: UserId,
        other: UserId,
        transition: Transition,
    ) -> Result<AppliedStep, FriendshipError> {
        let mutation = move |record: &mut UserRecord| -> Result<(), FriendshipError> {
            transition.apply(&mut record.relations, other)?;
            record.updated_at = Utc::now();
            Ok(())
        };
        let update = self.store.atomic_update(owner, &mutation).await?;

        let step = AppliedStep {
            owner,
            other,
            transition,
            before: update.before.relations.state_towards(other),
            after: update.after.relations.state_towards(other),
            record: update.after,
        };
        debug!(
            %owner, %other, step = step.transition.name,
            before = %step.before, after = %step.after,
            "relation step applied"
        );
        Ok(step)
    }

    /// Reverts `applied` newest first. On failure returns the owners whose
    /// change is still in place together with the error that stopped it.
    async fn compensate(
        &self,
        applied: &[AppliedStep],
    ) -> Result<(), (Vec<UserId>, FriendshipError)> {
        for (index, step) in applied.iter().enumerate().rev() {
            if step.before == step.after {
                continue;
            }
            let (other, before, after) = (step.other, step.before, step.after);
            let mutation = move |record: &mut UserRecord| -> Result<(), FriendshipError> {
                record.relations.revert(other, before, after)?;
                record.updated_at = Utc::now();
                Ok(())
            };
            if let Err(e) = self.store.atomic_update(step.owner, &mutation).await {
                let kept = applied[..=index]
                    .iter()
                    .filter(|s| s.before != s.after)
                    .map(|s| s.owner)
                    .collect();
                return Err((kept, e));
            }
        }
        Ok(())
    }

    /// Rolls back a saga whose step on `failed` returned `cause`.
    async fn abort(
        &self,
        applied: Vec<AppliedStep>,
        failed: UserId,
        cause: FriendshipError,
    ) -> FriendshipError {
        match self.compensate(&applied).await {
            Ok(()) => {
                warn!(%failed, error = %cause, steps = applied.len(), "relation change rolled back");
                cause
            }
            Err((kept, compensation_error)) => {
                error!(
                    %failed, ?kept, error = %cause, compensation = %compensation_error,
                    "relationship data inconsistent: rollback failed"
                );
                if let Some(first) = applied.first() {
                    self.audit(first.owner, first.other).await;
                }
                FriendshipError::PartialFailure {
                    applied: kept,
                    failed,
                    cause: format!("{cause}; rollback failed: {compensation_error}"),
                }
            }
        }
    }

    async fn audit(&self, a: UserId, b: UserId) {
        match (self.store.get_user(a).await, self.store.get_user(b).await) {
            (Ok(a), Ok(b)) => {
                for violation in audit_pair(&a, &b) {
                    error!(%violation, "relationship invariant violated");
                }
            }
            (Err(e), _) | (_, Err(e)) => warn!(error = %e, "could not audit relation pair"),
        }
    }

    /// Applies `first` on `first_owner` then `second` on the counterpart,
    /// compensating the first step if the second is rejected.
    async fn two_step(
        &self,
        first_owner: UserId,
        second_owner: UserId,
        first: Transition,
        second: Transition,
    ) -> Result<(AppliedStep, AppliedStep), FriendshipError> {
        let one = self.step(first_owner, second_owner, first).await?;
        match self.step(second_owner, first_owner, second).await {
            Ok(two) => Ok((one, two)),
            Err(e) => Err(self.abort(vec![one], second_owner, e).await),
        }
    }

    async fn summaries(&self, ids: &BTreeSet<UserId>) -> Result<Vec<ProfileSummary>, FriendshipError> {
        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get_user(*id).await {
                Ok(record) => summaries.push(record.summary()),
                Err(FriendshipError::NotFound(missing)) => {
                    warn!(%missing, "skipping dangling relation");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summaries)
    }
}

fn precheck(record: &UserRecord, other: UserId, transition: Transition) -> Result<PairState, FriendshipError> {
    let actual = record.relations.state_towards(other);
    if transition.target_for(actual).is_none() {
        return Err(FriendshipError::InvalidState(StateMismatch {
            expected: transition.expected(),
            actual,
        }));
    }
    Ok(actual)
}

fn outcome(user: ProfileSummary, state: PairState, message: String) -> FriendshipOutcome {
    FriendshipOutcome {
        user,
        state,
        message,
    }
}

#[async_trait::async_trait]
impl FriendshipService for RealFriendshipService {
    async fn request_friendship(
        &self,
        initiator: UserId,
        target: UserId,
    ) -> Result<FriendshipOutcome, FriendshipError> {
        let (mine, _) = self.load_pair(initiator, target).await?;
        if precheck(&mine, target, Transition::SEND_REQUEST)? == PairState::Incoming {
            info!(%initiator, %target, "request crosses a pending request, accepting it");
            return self.accept_friendship(initiator, target).await;
        }

        let sent = self.step(initiator, target, Transition::SEND_REQUEST).await?;
        let receive = if sent.after == PairState::Friends {
            Transition::CONFIRM_OUTGOING
        } else {
            Transition::RECEIVE_REQUEST
        };
        let received = match self.step(target, initiator, receive).await {
            Ok(step) => step,
            Err(e) => return Err(self.abort(vec![sent], target, e).await),
        };

        let mut state = sent.after;
        if sent.after == PairState::Outgoing && received.after == PairState::Friends {
            let stale = received.before == PairState::Friends;
            let settle = if stale {
                Transition::CONFIRMED_BY_FRIEND
            } else {
                // the target asked us at the same time; bring our side up to date
                Transition::CONFIRM_OUTGOING
            };
            match self.step(initiator, target, settle).await {
                Ok(settled) => state = settled.after,
                Err(FriendshipError::InvalidState(_)) if stale => {
                    // the target still lists a friendship that is being removed
                    let cause = FriendshipError::InvalidState(StateMismatch {
                        expected: vec![PairState::None],
                        actual: PairState::Friends,
                    });
                    return Err(self.abort(vec![sent, received], target, cause).await);
                }
                Err(e) => return Err(self.abort(vec![sent, received], initiator, e).await),
            }
        }

        let user = received.record.summary();
        let message = if state == PairState::Friends {
            info!(%initiator, %target, "mutual request, friendship established");
            format!("You and {} are now friends", user.username)
        } else {
            info!(%initiator, %target, "friend request sent");
            format!("Friend request sent to {}", user.username)
        };
        Ok(outcome(user, state, message))
    }

    async fn accept_friendship(
        &self,
        accepter: UserId,
        requester: UserId,
    ) -> Result<FriendshipOutcome, FriendshipError> {
        let (mine, _) = self.load_pair(accepter, requester).await?;
        precheck(&mine, requester, Transition::ACCEPT_INCOMING)?;

        let (_, confirmed) = self
            .two_step(
                accepter,
                requester,
                Transition::ACCEPT_INCOMING,
                Transition::CONFIRM_OUTGOING,
            )
            .await?;

        info!(%accepter, %requester, "friend request accepted");
        let user = confirmed.record.summary();
        let message = format!("You and {} are now friends", user.username);
        Ok(outcome(user, PairState::Friends, message))
    }

    async fn deny_friendship(
        &self,
        denied_by: UserId,
        requester: UserId,
    ) -> Result<FriendshipOutcome, FriendshipError> {
        let (mine, _) = self.load_pair(denied_by, requester).await?;
        precheck(&mine, requester, Transition::DENY_INCOMING)?;

        let (_, withdrawn) = self
            .two_step(
                denied_by,
                requester,
                Transition::DENY_INCOMING,
                Transition::WITHDRAW_OUTGOING,
            )
            .await?;

        info!(%denied_by, %requester, "friend request denied");
        let user = withdrawn.record.summary();
        let message = format!("Friend request from {} denied", user.username);
        Ok(outcome(user, PairState::None, message))
    }

    async fn unfollow(
        &self,
        initiator: UserId,
        other: UserId,
    ) -> Result<FriendshipOutcome, FriendshipError> {
        let (mine, _) = self.load_pair(initiator, other).await?;
        precheck(&mine, other, Transition::DROP_FRIEND)?;

        let (_, dropped) = self
            .two_step(
                initiator,
                other,
                Transition::DROP_FRIEND,
                Transition::DROPPED_BY_FRIEND,
            )
            .await?;

        info!(%initiator, %other, "friend removed");
        let user = dropped.record.summary();
        let message = format!("You are no longer friends with {}", user.username);
        Ok(outcome(user, PairState::None, message))
    }

    async fn relation_state(
        &self,
        me: UserId,
        other: UserId,
    ) -> Result<PairState, FriendshipError> {
        let (mine, _) = self.load_pair(me, other).await?;
        Ok(mine.relations.state_towards(other))
    }

    async fn list_relations(&self, me: UserId) -> Result<RelationsView, FriendshipError> {
        let record = self.store.get_user(me).await?;
        Ok(RelationsView {
            friends: self.summaries(&record.relations.friends).await?,
            incoming_requests: self.summaries(&record.relations.incoming_requests).await?,
            outgoing_requests: self.summaries(&record.relations.outgoing_requests).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryRelationshipStore;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    enum Fault {
        Pass,
        Missing,
        Conflict,
    }

    /// Memory store that fails scripted updates per user.
    struct FaultyStore {
        inner: MemoryRelationshipStore,
        plan: Mutex<HashMap<UserId, VecDeque<Fault>>>,
    }

    impl FaultyStore {
        fn new(inner: MemoryRelationshipStore) -> Self {
            Self {
                inner,
                plan: Mutex::new(HashMap::new()),
            }
        }

        fn script(&self, user_id: UserId, faults: &[Fault]) {
            self.plan
                .lock()
                .unwrap()
                .insert(user_id, faults.iter().copied().collect());
        }

        fn next_fault(&self, user_id: UserId) -> Fault {
            self.plan
                .lock()
                .unwrap()
                .get_mut(&user_id)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(Fault::Pass)
        }
    }

    #[async_trait::async_trait]
    impl RelationshipStore for FaultyStore {
        async fn get_user(&self, user_id: UserId) -> Result<UserRecord, FriendshipError> {
            self.inner.get_user(user_id).await
        }

        async fn atomic_update(
            &self,
            user_id: UserId,
            mutation: &RecordMutation<'_>,
        ) -> Result<RecordUpdate, FriendshipError> {
            match self.next_fault(user_id) {
                Fault::Pass => self.inner.atomic_update(user_id, mutation).await,
                Fault::Missing => Err(FriendshipError::NotFound(user_id)),
                Fault::Conflict => Err(FriendshipError::ConflictRetryExhausted(user_id)),
            }
        }
    }

    fn seeded() -> (Arc<MemoryRelationshipStore>, UserId, UserId) {
        let store = Arc::new(MemoryRelationshipStore::new());
        let alice = UserRecord::new(UserId::new_v4(), "alice");
        let bobby = UserRecord::new(UserId::new_v4(), "bobby");
        let ids = (alice.user_id, bobby.user_id);
        store.insert_user(alice);
        store.insert_user(bobby);
        (store, ids.0, ids.1)
    }

    async fn relations(store: &dyn RelationshipStore, id: UserId) -> Relations {
        store.get_user(id).await.unwrap().relations
    }

    #[tokio::test]
    async fn request_then_accept_then_unfollow() {
        let (store, a, b) = seeded();
        let service = RealFriendshipService::new(store.clone());

        let sent = service.request_friendship(a, b).await.unwrap();
        assert_eq!(sent.state, PairState::Outgoing);
        assert_eq!(sent.user.id, b);
        assert_eq!(sent.user.username, "bobby");
        assert!(relations(&*store, a).await.outgoing_requests.contains(&b));
        assert!(relations(&*store, b).await.incoming_requests.contains(&a));

        let accepted = service.accept_friendship(b, a).await.unwrap();
        assert_eq!(accepted.state, PairState::Friends);
        assert_eq!(accepted.user.id, a);
        assert_eq!(service.relation_state(a, b).await.unwrap(), PairState::Friends);
        assert_eq!(service.relation_state(b, a).await.unwrap(), PairState::Friends);

        let dropped = service.unfollow(a, b).await.unwrap();
        assert_eq!(dropped.state, PairState::None);
        assert_eq!(relations(&*store, a).await, Relations::default());
        assert_eq!(relations(&*store, b).await, Relations::default());
    }

    #[tokio::test]
    async fn deny_clears_both_sides() {
        let (store, a, b) = seeded();
        let service = RealFriendshipService::new(store.clone());

        service.request_friendship(a, b).await.unwrap();
        let denied = service.deny_friendship(b, a).await.unwrap();

        assert_eq!(denied.state, PairState::None);
        assert_eq!(denied.message, "Friend request from alice denied");
        assert_eq!(relations(&*store, a).await, Relations::default());
        assert_eq!(relations(&*store, b).await, Relations::default());
    }

    #[tokio::test]
    async fn second_deny_is_invalid_state() {
        let (store, a, b) = seeded();
        let service = RealFriendshipService::new(store.clone());

        service.request_friendship(a, b).await.unwrap();
        service.deny_friendship(b, a).await.unwrap();
        let err = service.deny_friendship(b, a).await.unwrap_err();

        assert!(matches!(
            err,
            FriendshipError::InvalidState(StateMismatch { actual: PairState::None, .. })
        ));
        assert_eq!(relations(&*store, a).await, Relations::default());
        assert_eq!(relations(&*store, b).await, Relations::default());
    }

    #[tokio::test]
    async fn accept_without_request_is_rejected() {
        let (store, a, b) = seeded();
        let service = RealFriendshipService::new(store.clone());

        let err = service.accept_friendship(b, a).await.unwrap_err();
        assert!(matches!(err, FriendshipError::InvalidState(_)));
        assert_eq!(
            err.to_string(),
            "invalid relationship state: expected incoming request, found none"
        );
        assert_eq!(relations(&*store, a).await, Relations::default());
        assert_eq!(relations(&*store, b).await, Relations::default());
    }

    #[tokio::test]
    async fn requester_cannot_accept_own_request() {
        let (store, a, b) = seeded();
        let service = RealFriendshipService::new(store.clone());

        service.request_friendship(a, b).await.unwrap();
        let err = service.accept_friendship(a, b).await.unwrap_err();

        assert!(matches!(err, FriendshipError::InvalidState(_)));
        assert_eq!(service.relation_state(a, b).await.unwrap(), PairState::Outgoing);
    }

    #[tokio::test]
    async fn duplicate_requests_are_rejected() {
        let (store, a, b) = seeded();
        let service = RealFriendshipService::new(store.clone());

        service.request_friendship(a, b).await.unwrap();
        assert!(matches!(
            service.request_friendship(a, b).await,
            Err(FriendshipError::InvalidState(_))
        ));

        service.accept_friendship(b, a).await.unwrap();
        assert!(matches!(
            service.request_friendship(a, b).await,
            Err(FriendshipError::InvalidState(_))
        ));
        assert!(matches!(
            service.request_friendship(b, a).await,
            Err(FriendshipError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn crossed_request_becomes_friendship() {
        let (store, a, b) = seeded();
        let service = RealFriendshipService::new(store.clone());

        service.request_friendship(a, b).await.unwrap();
        let crossed = service.request_friendship(b, a).await.unwrap();

        assert_eq!(crossed.state, PairState::Friends);
        assert_eq!(crossed.message, "You and alice are now friends");
        let ra = relations(&*store, a).await;
        let rb = relations(&*store, b).await;
        assert!(ra.friends.contains(&b) && rb.friends.contains(&a));
        assert!(ra.outgoing_requests.is_empty() && rb.incoming_requests.is_empty());
    }

    #[tokio::test]
    async fn request_against_unfinished_unfollow_is_rolled_back() {
        let (store, a, b) = seeded();
        let service = RealFriendshipService::new(store.clone());
        // a already dropped b, the matching change on b has not landed yet
        let mut bobby = store.get_user(b).await.unwrap();
        bobby.relations.set_state(a, PairState::Friends);
        store.insert_user(bobby);

        let err = service.request_friendship(a, b).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "invalid relationship state: expected none, found friends"
        );
        assert_eq!(relations(&*store, a).await, Relations::default());
        assert_eq!(relations(&*store, b).await.state_towards(a), PairState::Friends);
    }

    #[tokio::test]
    async fn self_reference_never_reaches_the_store() {
        let store = Arc::new(FaultyStore::new(MemoryRelationshipStore::new()));
        let service = RealFriendshipService::new(store);
        let me = UserId::new_v4();

        assert!(matches!(
            service.request_friendship(me, me).await,
            Err(FriendshipError::SelfReference)
        ));
        assert!(matches!(
            service.unfollow(me, me).await,
            Err(FriendshipError::SelfReference)
        ));
    }

    #[tokio::test]
    async fn unknown_counterpart_is_not_found() {
        let (store, a, _) = seeded();
        let service = RealFriendshipService::new(store.clone());
        let ghost = UserId::new_v4();

        let err = service.request_friendship(a, ghost).await.unwrap_err();
        assert!(matches!(err, FriendshipError::NotFound(id) if id == ghost));
        assert_eq!(relations(&*store, a).await, Relations::default());
    }

    #[tokio::test]
    async fn failed_second_step_is_rolled_back() {
        let (memory, a, b) = seeded();
        let inner = Arc::try_unwrap(memory).unwrap();
        let store = Arc::new(FaultyStore::new(inner));
        let service = RealFriendshipService::new(store.clone());

        store.script(b, &[Fault::Missing]);
        let err = service.request_friendship(a, b).await.unwrap_err();

        assert!(matches!(err, FriendshipError::NotFound(id) if id == b));
        assert_eq!(relations(&*store, a).await, Relations::default());
        assert_eq!(relations(&*store, b).await, Relations::default());
    }

    #[tokio::test]
    async fn failed_rollback_reports_partial_failure() {
        let (memory, a, b) = seeded();
        let inner = Arc::try_unwrap(memory).unwrap();
        let store = Arc::new(FaultyStore::new(inner));
        let service = RealFriendshipService::new(store.clone());

        service.request_friendship(a, b).await.unwrap();
        // accept on b passes, confirm on a fails, rollback on b fails
        store.script(a, &[Fault::Conflict]);
        store.script(b, &[Fault::Pass, Fault::Conflict]);
        let err = service.accept_friendship(b, a).await.unwrap_err();

        match err {
            FriendshipError::PartialFailure { applied, failed, .. } => {
                assert_eq!(applied, vec![b]);
                assert_eq!(failed, a);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn conflict_on_first_step_changes_nothing() {
        let (memory, a, b) = seeded();
        let inner = Arc::try_unwrap(memory).unwrap();
        let store = Arc::new(FaultyStore::new(inner));
        let service = RealFriendshipService::new(store.clone());

        store.script(a, &[Fault::Conflict]);
        let err = service.request_friendship(a, b).await.unwrap_err();

        assert!(matches!(err, FriendshipError::ConflictRetryExhausted(id) if id == a));
        assert_eq!(relations(&*store, a).await, Relations::default());
        assert_eq!(relations(&*store, b).await, Relations::default());
    }

    #[tokio::test]
    async fn listing_skips_dangling_ids() {
        let (store, a, b) = seeded();
        let carol = UserRecord::new(UserId::new_v4(), "carol");
        let c = carol.user_id;
        store.insert_user(carol);
        let service = RealFriendshipService::new(store.clone());

        service.request_friendship(a, b).await.unwrap();
        service.request_friendship(c, a).await.unwrap();
        store.remove_user(b);

        let view = service.list_relations(a).await.unwrap();
        assert!(view.friends.is_empty());
        assert!(view.outgoing_requests.is_empty());
        assert_eq!(view.incoming_requests.len(), 1);
        assert_eq!(view.incoming_requests[0].username, "carol");
    }
}
