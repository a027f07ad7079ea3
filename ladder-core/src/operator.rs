//! Score merge operators
//!
//! Each operator is a pure, total function from (stored, submitted) to the
//! new stored (score, subscore). `stored` is `None` for an owner with no
//! record in the epoch yet.

use crate::types::{DecrementFloor, Operator, SortOrder};

/// (score, subscore)
pub type ScorePair = (i64, i64);

/// Per-leaderboard policy inputs for a merge.
#[derive(Debug, Clone, Copy)]
pub struct MergeContext {
    pub order: SortOrder,
    pub decrement_floor: DecrementFloor,
}

pub type MergeFn = fn(&MergeContext, Option<ScorePair>, ScorePair) -> ScorePair;

impl Operator {
    pub fn merge_fn(self) -> MergeFn {
        match self {
            Operator::Best => merge_best,
            Operator::Set => merge_set,
            Operator::Increment => merge_increment,
            Operator::Decrement => merge_decrement,
        }
    }

    pub fn merge(self, ctx: &MergeContext, stored: Option<ScorePair>, submitted: ScorePair) -> ScorePair {
        (self.merge_fn())(ctx, stored, submitted)
    }
}

/// Keep whichever pair ranks better; ties keep the stored pair.
pub fn merge_best(ctx: &MergeContext, stored: Option<ScorePair>, submitted: ScorePair) -> ScorePair {
    match stored {
        Some(current) if ctx.order.compare_scores(submitted, current).is_lt() => submitted,
        Some(current) => current,
        None => submitted,
    }
}

pub fn merge_set(_ctx: &MergeContext, _stored: Option<ScorePair>, submitted: ScorePair) -> ScorePair {
    submitted
}

pub fn merge_increment(_ctx: &MergeContext, stored: Option<ScorePair>, submitted: ScorePair) -> ScorePair {
    let (score, subscore) = stored.unwrap_or((0, 0));
    (
        score.saturating_add(submitted.0),
        subscore.saturating_add(submitted.1),
    )
}

pub fn merge_decrement(ctx: &MergeContext, stored: Option<ScorePair>, submitted: ScorePair) -> ScorePair {
    let (score, subscore) = stored.unwrap_or((0, 0));
    let score = score.saturating_sub(submitted.0);
    let subscore = subscore.saturating_sub(submitted.1);
    match ctx.decrement_floor {
        DecrementFloor::Zero => (score.max(0), subscore.max(0)),
        DecrementFloor::Unbounded => (score, subscore),
    }
}
