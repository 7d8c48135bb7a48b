//! Vote state machine.
//!
//! A vote moves one user's entry in a post's `voters` ledger between
//! absent, `up` and `down`, and adjusts the tallies to match, all in one
//! atomic batch. The plan is computed from the post the caller holds, so the
//! guard against decrementing an empty tally reads cached values rather than
//! the stored ones.

use std::collections::BTreeMap;
use std::sync::Arc;

use bookforum_shared::{Post, VoteDirection};
use tracing::{debug, error, info};

use crate::store::{self, BatchOp, Counter, DocumentStore, Mutation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotePlan {
    pub previous: Option<VoteDirection>,
    /// `None` when the vote is retracted.
    pub next: Option<VoteDirection>,
    pub ops: Vec<BatchOp>,
}

impl VotePlan {
    /// The post as it will read once the batch has committed.
    pub fn project(&self, post: &Post) -> Post {
        let mut post = post.clone();
        for op in &self.ops {
            op.apply_to(&mut post);
        }
        post
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Nobody signed in; nothing written.
    Ignored,
    Committed(VotePlan),
    Failed(VotePlan),
}

pub fn plan_vote(
    post_id: &str,
    voters: &BTreeMap<String, VoteDirection>,
    requested: VoteDirection,
    snapshot: &Post,
    user_id: &str,
) -> VotePlan {
    let previous = voters.get(user_id).copied();
    let op = |mutation| BatchOp::new(post_id, mutation);
    let mut ops = Vec::new();

    if let Some(prev) = previous {
        if snapshot.tally(prev) > 0 {
            ops.push(op(Mutation::Increment(Counter::tally(prev), -1)));
        } else {
            debug!(post_id, direction = prev.as_str(), "tally already zero; not decrementing");
        }
        ops.push(op(Mutation::Increment(Counter::Interactions, -1)));
        ops.push(op(Mutation::DeleteVoter(user_id.to_string())));
    }

    let next = if previous == Some(requested) {
        None
    } else {
        ops.push(op(Mutation::Increment(Counter::tally(requested), 1)));
        ops.push(op(Mutation::Increment(Counter::Interactions, 1)));
        ops.push(op(Mutation::SetVoter(user_id.to_string(), requested)));
        Some(requested)
    };

    VotePlan { previous, next, ops }
}

pub struct VoteEngine<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> VoteEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Plans and commits one vote. Commit failures are logged and reported
    /// as [`VoteOutcome::Failed`]; there is no retry.
    pub async fn apply_vote(
        &self,
        post_id: &str,
        voters: &BTreeMap<String, VoteDirection>,
        requested: VoteDirection,
        snapshot: &Post,
        acting_user: Option<&str>,
    ) -> VoteOutcome {
        let Some(user_id) = acting_user else {
            debug!(post_id, "vote ignored: not signed in");
            return VoteOutcome::Ignored;
        };

        let plan = plan_vote(post_id, voters, requested, snapshot, user_id);
        let ops = plan.ops.clone();
        match store::blocking(&self.store, move |s| s.commit(&ops)).await {
            Ok(()) => {
                info!(
                    post_id,
                    user = user_id,
                    previous = plan.previous.map(VoteDirection::as_str),
                    next = plan.next.map(VoteDirection::as_str),
                    "vote committed"
                );
                VoteOutcome::Committed(plan)
            }
            Err(e) => {
                error!(post_id, user = user_id, error = %e, "error updating vote");
                VoteOutcome::Failed(plan)
            }
        }
    }

    /// [`VoteEngine::apply_vote`] using the ledger carried by `post`.
    pub async fn vote(
        &self,
        post: &Post,
        requested: VoteDirection,
        acting_user: Option<&str>,
    ) -> VoteOutcome {
        self.apply_vote(&post.id, &post.voters, requested, post, acting_user)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(up: i64, down: i64, voters: &[(&str, VoteDirection)]) -> Post {
        Post {
            id: "p".into(),
            title: "Thoughts on chapter 3".into(),
            content: "".into(),
            book_title: "Middlemarch".into(),
            book_author: "George Eliot".into(),
            user_name: "dorothea".into(),
            user_photo: None,
            created_at: 1,
            up_votes: up,
            down_votes: down,
            interactions: up + down,
            comment_count: 0,
            voters: voters.iter().map(|(u, d)| (u.to_string(), *d)).collect(),
        }
    }

    fn plan(p: &Post, dir: VoteDirection, user: &str) -> VotePlan {
        plan_vote(&p.id, &p.voters, dir, p, user)
    }

    #[test]
    fn fresh_vote_is_a_single_increment() {
        let p = post(3, 1, &[]);
        let plan = plan(&p, VoteDirection::Up, "a");

        assert_eq!(plan.previous, None);
        assert_eq!(plan.next, Some(VoteDirection::Up));
        assert_eq!(
            plan.ops,
            vec![
                BatchOp::new("p", Mutation::Increment(Counter::UpVotes, 1)),
                BatchOp::new("p", Mutation::Increment(Counter::Interactions, 1)),
                BatchOp::new("p", Mutation::SetVoter("a".into(), VoteDirection::Up)),
            ]
        );
        let after = plan.project(&p);
        assert_eq!(after.up_votes, 4);
        assert_eq!(after.vote_of("a"), Some(VoteDirection::Up));
    }

    #[test]
    fn same_direction_retracts() {
        let p = post(4, 1, &[("a", VoteDirection::Up)]);
        let plan = plan(&p, VoteDirection::Up, "a");

        assert_eq!(plan.next, None);
        let after = plan.project(&p);
        assert_eq!(after.up_votes, 3);
        assert_eq!(after.interactions, p.interactions - 1);
        assert!(after.voters.is_empty());
    }

    #[test]
    fn switching_moves_one_vote() {
        let p = post(3, 1, &[("a", VoteDirection::Up)]);
        let after = plan(&p, VoteDirection::Down, "a").project(&p);

        assert_eq!((after.up_votes, after.down_votes), (2, 2));
        assert_eq!(after.interactions, p.interactions);
        assert_eq!(after.vote_of("a"), Some(VoteDirection::Down));
    }

    #[test]
    fn empty_tally_is_never_decremented() {
        let p = post(0, 0, &[("a", VoteDirection::Down)]);
        let plan = plan(&p, VoteDirection::Up, "a");

        assert!(!plan
            .ops
            .contains(&BatchOp::new("p", Mutation::Increment(Counter::DownVotes, -1))));
        let after = plan.project(&p);
        assert_eq!(after.down_votes, 0);
        assert_eq!(after.up_votes, 1);
    }

    #[test]
    fn other_voters_are_untouched() {
        let p = post(2, 0, &[("a", VoteDirection::Up), ("b", VoteDirection::Up)]);
        let after = plan(&p, VoteDirection::Up, "a").project(&p);

        assert_eq!(after.vote_of("b"), Some(VoteDirection::Up));
        assert_eq!(after.vote_of("a"), None);
        assert_eq!(after.up_votes, 1);
    }
}
