//! Engagement streak with grace blocks.
//!
//! A streak survives missed days as long as the user has grace blocks left:
//! every whole day without activity between two active days (or between the
//! last active day and today) consumes one block. Completing a scheduled
//! review on an active day hands one block back.
//!
//! Two entry points share the same charging rule:
//! - [`recompute`] walks the full activity history.
//! - [`reconcile`] advances a persisted [`StreakState`] to a later day
//!   without reading history.
//!
//! Persisting `recompute(history, budget, t1)` and later calling
//! `reconcile(&stored, t2)` yields exactly `recompute(history, budget, t2)`.
//! This works because the stored state remembers the day its `blocks_used`
//! was charged up to (`evaluated_on`), so no missed day is charged twice.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::diff_in_days;
use crate::types::StreakState;

/// Upper bound for any grace budget.
pub const MAX_BLOCKS: u32 = 3;

/// Budget used when the user has not configured one.
pub const DEFAULT_BLOCKS: u32 = 2;

/// How far back history is read for a full recompute.
pub const LOOKBACK_DAYS: u32 = 400;

/// Clamp a requested grace budget into `[0, MAX_BLOCKS]`.
pub fn clamp_blocks(requested: u32) -> u32 {
    requested.min(MAX_BLOCKS)
}

/// A day with at least one study record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDay {
    pub day: NaiveDate,
    /// Reviews completed that day; each returns one consumed block.
    pub recovery_credits: u32,
}

impl ActivityDay {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            recovery_credits: 0,
        }
    }

    pub fn with_credits(day: NaiveDate, recovery_credits: u32) -> Self {
        Self {
            day,
            recovery_credits,
        }
    }
}

/// Merge raw study days and review completion days into activity.
///
/// Input order and duplicates do not matter. Each entry in
/// `completion_days` is one credit; a completion is itself a study record,
/// so its day counts as active even if missing from `study_days`.
pub fn collect_activity(study_days: &[NaiveDate], completion_days: &[NaiveDate]) -> Vec<ActivityDay> {
    let mut by_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for day in study_days {
        by_day.entry(*day).or_insert(0);
    }
    for day in completion_days {
        *by_day.entry(*day).or_insert(0) += 1;
    }

    by_day
        .into_iter()
        .map(|(day, credits)| ActivityDay::with_credits(day, credits))
        .collect()
}

/// Streak as of a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    pub current: u32,
    pub blocks_total: u32,
    pub blocks_used: u32,
    pub blocks_remaining: u32,
    pub last_active_day: Option<NaiveDate>,
    pub evaluated_on: NaiveDate,
}

impl StreakSummary {
    /// State to persist for this summary.
    pub fn to_state(&self) -> StreakState {
        StreakState {
            current: self.current,
            blocks_total: self.blocks_total,
            blocks_used: self.blocks_used,
            last_active_day: self.last_active_day,
            evaluated_on: Some(self.evaluated_on),
        }
    }

    /// Whether persisting this summary would change what the user sees.
    pub fn differs_from(&self, state: &StreakState) -> bool {
        self.current != state.current
            || self.blocks_used != state.blocks_used
            || self.blocks_total != state.blocks_total
    }

    /// Whether the grace budget ran out before today.
    pub fn is_broken(&self) -> bool {
        self.current == 0 && self.last_active_day.is_some()
    }

    fn empty(blocks_total: u32, today: NaiveDate) -> Self {
        Self {
            current: 0,
            blocks_total,
            blocks_used: 0,
            blocks_remaining: blocks_total,
            last_active_day: None,
            evaluated_on: today,
        }
    }

    fn broken(blocks_total: u32, last_active_day: NaiveDate, today: NaiveDate) -> Self {
        Self {
            current: 0,
            blocks_total,
            blocks_used: blocks_total,
            blocks_remaining: 0,
            last_active_day: Some(last_active_day),
            evaluated_on: today,
        }
    }
}

/// Recompute the streak from activity history.
pub fn recompute(activity: &[ActivityDay], blocks_total: u32, today: NaiveDate) -> StreakSummary {
    let total = clamp_blocks(blocks_total);

    match fold_history(activity, total) {
        None => StreakSummary::empty(total, today),
        Some(run) => charge_to(run, total, today),
    }
}

/// Advance a persisted streak to `today` without reading history.
///
/// Charges against the budget stored in `state`. When the user's budget has
/// changed since, only a full [`recompute`] gives the right answer.
pub fn reconcile(state: &StreakState, today: NaiveDate) -> StreakSummary {
    let total = clamp_blocks(state.blocks_total);

    let Some(last) = state.last_active_day else {
        return StreakSummary::empty(total, today);
    };

    // Once broken, only new activity (a full recompute) restarts the streak.
    if state.current == 0 {
        return StreakSummary::broken(total, last, today);
    }

    let already_charged = missed_between(last, state.evaluated_on.unwrap_or(last));
    let used_at_last = (i64::from(state.blocks_used.min(total)) - already_charged).max(0);

    let run = Run {
        current: state.current,
        blocks_used: used_at_last as u32,
        last,
    };
    charge_to(run, total, today)
}

/// Streak run as of its last active day.
#[derive(Debug, Clone, Copy)]
struct Run {
    current: u32,
    blocks_used: u32,
    last: NaiveDate,
}

fn fold_history(activity: &[ActivityDay], total: u32) -> Option<Run> {
    let mut days: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for entry in activity {
        *days.entry(entry.day).or_insert(0) += entry.recovery_credits;
    }

    let mut run: Option<Run> = None;
    for (day, credits) in days {
        let mut next = match run {
            None => Run {
                current: 1,
                blocks_used: 0,
                last: day,
            },
            Some(prev) => {
                let missed = diff_in_days(day, prev.last) - 1;
                if missed <= 0 {
                    Run {
                        current: prev.current + 1,
                        blocks_used: prev.blocks_used,
                        last: day,
                    }
                } else if i64::from(prev.blocks_used) + missed > i64::from(total) {
                    Run {
                        current: 1,
                        blocks_used: 0,
                        last: day,
                    }
                } else {
                    Run {
                        current: prev.current + 1,
                        blocks_used: prev.blocks_used + missed as u32,
                        last: day,
                    }
                }
            }
        };

        next.blocks_used = next.blocks_used.saturating_sub(credits);
        run = Some(next);
    }

    run
}

fn charge_to(run: Run, total: u32, today: NaiveDate) -> StreakSummary {
    let used = i64::from(run.blocks_used) + missed_between(run.last, today);

    if used > i64::from(total) {
        return StreakSummary::broken(total, run.last, today);
    }

    let used = used as u32;
    StreakSummary {
        current: run.current,
        blocks_total: total,
        blocks_used: used,
        blocks_remaining: total - used,
        last_active_day: Some(run.last),
        evaluated_on: today,
    }
}

/// Whole days without activity strictly between `last` and `day`.
fn missed_between(last: NaiveDate, day: NaiveDate) -> i64 {
    (diff_in_days(day, last) - 1).max(0)
}
