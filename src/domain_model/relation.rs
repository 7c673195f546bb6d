use crate::domain_model::{UserId, UserRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How one user's record sees another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    None,
    /// This user asked the other one.
    Outgoing,
    /// The other user asked this one.
    Incoming,
    Friends,
    /// The other id sits in more than one set. Never produced by a transition.
    Conflicted,
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairState::None => "none",
            PairState::Outgoing => "outgoing request",
            PairState::Incoming => "incoming request",
            PairState::Friends => "friends",
            PairState::Conflicted => "conflicted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relations {
    pub friends: BTreeSet<UserId>,
    pub incoming_requests: BTreeSet<UserId>,
    pub outgoing_requests: BTreeSet<UserId>,
}

impl Relations {
    pub fn state_towards(&self, other: UserId) -> PairState {
        match (
            self.friends.contains(&other),
            self.incoming_requests.contains(&other),
            self.outgoing_requests.contains(&other),
        ) {
            (false, false, false) => PairState::None,
            (true, false, false) => PairState::Friends,
            (false, true, false) => PairState::Incoming,
            (false, false, true) => PairState::Outgoing,
            _ => PairState::Conflicted,
        }
    }

    /// Moves `other` into exactly the set matching `state`.
    /// `Conflicted` is not a target and leaves the record untouched.
    pub fn set_state(&mut self, other: UserId, state: PairState) {
        if state == PairState::Conflicted {
            return;
        }
        self.friends.remove(&other);
        self.incoming_requests.remove(&other);
        self.outgoing_requests.remove(&other);
        match state {
            PairState::Friends => {
                self.friends.insert(other);
            }
            PairState::Incoming => {
                self.incoming_requests.insert(other);
            }
            PairState::Outgoing => {
                self.outgoing_requests.insert(other);
            }
            PairState::None | PairState::Conflicted => {}
        }
    }

    /// Undo of an applied transition: only valid while the record still shows `after`.
    pub fn revert(
        &mut self,
        other: UserId,
        before: PairState,
        after: PairState,
    ) -> Result<(), StateMismatch> {
        let actual = self.state_towards(other);
        if actual != after {
            return Err(StateMismatch {
                expected: vec![after],
                actual,
            });
        }
        self.set_state(other, before);
        Ok(())
    }

    pub fn references(&self, id: UserId) -> bool {
        self.friends.contains(&id)
            || self.incoming_requests.contains(&id)
            || self.outgoing_requests.contains(&id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMismatch {
    pub expected: Vec<PairState>,
    pub actual: PairState,
}

impl fmt::Display for StateMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = self
            .expected
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        write!(f, "expected {}, found {}", expected, self.actual)
    }
}

/// A single-record step of the friendship state machine.
///
/// Each rule maps the state a record currently has towards the counterpart
/// onto the state it must have afterwards. A record in any other state is
/// rejected, so the precondition is re-checked every time the step is applied
/// against a freshly read record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub name: &'static str,
    rules: &'static [(PairState, PairState)],
}

impl Transition {
    /// Initiator of a request. An incoming request from the target turns into
    /// a friendship instead of a second, crossed request.
    pub const SEND_REQUEST: Transition = Transition {
        name: "send_request",
        rules: &[
            (PairState::None, PairState::Outgoing),
            (PairState::Incoming, PairState::Friends),
        ],
    };

    /// Target of a request whose initiator now holds it as outgoing.
    /// `Outgoing` here means both sides asked each other at once. `Friends`
    /// is either a crossing request that already settled or a friendship whose
    /// unfollow has not reached this record yet; [`Transition::CONFIRMED_BY_FRIEND`]
    /// tells the two apart on the initiator's side.
    pub const RECEIVE_REQUEST: Transition = Transition {
        name: "receive_request",
        rules: &[
            (PairState::None, PairState::Incoming),
            (PairState::Incoming, PairState::Incoming),
            (PairState::Outgoing, PairState::Friends),
            (PairState::Friends, PairState::Friends),
        ],
    };

    /// Initiator whose target already listed it as a friend. Only a crossing
    /// request promotes the initiator before the target, so a record still
    /// holding its own outgoing request is facing a stale friendship.
    pub const CONFIRMED_BY_FRIEND: Transition = Transition {
        name: "confirmed_by_friend",
        rules: &[(PairState::Friends, PairState::Friends)],
    };

    pub const ACCEPT_INCOMING: Transition = Transition {
        name: "accept_incoming",
        rules: &[(PairState::Incoming, PairState::Friends)],
    };

    /// A record whose outgoing request was answered with a friendship, either
    /// by an accept or by a crossing request from the counterpart.
    pub const CONFIRM_OUTGOING: Transition = Transition {
        name: "confirm_outgoing",
        rules: &[
            (PairState::Outgoing, PairState::Friends),
            (PairState::Friends, PairState::Friends),
        ],
    };

    pub const DENY_INCOMING: Transition = Transition {
        name: "deny_incoming",
        rules: &[(PairState::Incoming, PairState::None)],
    };

    pub const WITHDRAW_OUTGOING: Transition = Transition {
        name: "withdraw_outgoing",
        rules: &[
            (PairState::Outgoing, PairState::None),
            (PairState::None, PairState::None),
        ],
    };

    pub const DROP_FRIEND: Transition = Transition {
        name: "drop_friend",
        rules: &[(PairState::Friends, PairState::None)],
    };

    pub const DROPPED_BY_FRIEND: Transition = Transition {
        name: "dropped_by_friend",
        rules: &[
            (PairState::Friends, PairState::None),
            (PairState::None, PairState::None),
        ],
    };

    pub fn target_for(&self, current: PairState) -> Option<PairState> {
        self.rules
            .iter()
            .find(|(from, _)| *from == current)
            .map(|(_, to)| *to)
    }

    pub fn expected(&self) -> Vec<PairState> {
        let mut expected = Vec::with_capacity(self.rules.len());
        for (from, _) in self.rules {
            if !expected.contains(from) {
                expected.push(*from);
            }
        }
        expected
    }

    /// Applies the step to `relations` and returns `(before, after)`.
    pub fn apply(
        &self,
        relations: &mut Relations,
        other: UserId,
    ) -> Result<(PairState, PairState), StateMismatch> {
        let before = relations.state_towards(other);
        let after = self.target_for(before).ok_or_else(|| StateMismatch {
            expected: self.expected(),
            actual: before,
        })?;
        relations.set_state(other, after);
        Ok((before, after))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{0} references itself")]
    SelfRelation(UserId),
    #[error("friendship between {0} and {1} is one-sided")]
    AsymmetricFriendship(UserId, UserId),
    #[error("request from {from} to {to} is not mirrored")]
    UnmirroredRequest { from: UserId, to: UserId },
    #[error("{owner} holds {other} in more than one relation set")]
    ConflictingSets { owner: UserId, other: UserId },
}

/// Checks the pairwise relationship invariants between two records.
pub fn audit_pair(a: &UserRecord, b: &UserRecord) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for record in [a, b] {
        if record.relations.references(record.user_id) {
            violations.push(InvariantViolation::SelfRelation(record.user_id));
        }
    }
    if a.user_id == b.user_id {
        return violations;
    }

    let (ra, rb) = (&a.relations, &b.relations);
    if ra.friends.contains(&b.user_id) != rb.friends.contains(&a.user_id) {
        violations.push(InvariantViolation::AsymmetricFriendship(a.user_id, b.user_id));
    }
    if ra.outgoing_requests.contains(&b.user_id) != rb.incoming_requests.contains(&a.user_id) {
        violations.push(InvariantViolation::UnmirroredRequest {
            from: a.user_id,
            to: b.user_id,
        });
    }
    if rb.outgoing_requests.contains(&a.user_id) != ra.incoming_requests.contains(&b.user_id) {
        violations.push(InvariantViolation::UnmirroredRequest {
            from: b.user_id,
            to: a.user_id,
        });
    }
    if ra.state_towards(b.user_id) == PairState::Conflicted {
        violations.push(InvariantViolation::ConflictingSets {
            owner: a.user_id,
            other: b.user_id,
        });
    }
    if rb.state_towards(a.user_id) == PairState::Conflicted {
        violations.push(InvariantViolation::ConflictingSets {
            owner: b.user_id,
            other: a.user_id,
        });
    }

    violations
}
