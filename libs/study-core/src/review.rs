//! Scheduled review lifecycle.
//!
//! ```text
//!   Pending ──(date < today)──▶ Late ──(date < today - N)──▶ Expired
//!      ▲  ▲                      │
//!      │  └──(date >= today)─────┘
//!   Snoozed ──(date < today)──▶ Late
//!
//!   Pending | Snoozed | Late ──complete──▶ Done
//!   any but Done ──snooze──▶ Snoozed
//! ```
//!
//! Time-driven transitions are expressed as [`BulkTransition`]s so storage can
//! run each pass as one bulk update; [`apply_transitions`] runs the same
//! passes over items already in memory.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::add_days;
use crate::error::{EngineError, Result};
use crate::types::{
    NewReviewItem, RecordId, RecordKind, ReviewItem, ReviewStatus, StudyRecord, SubjectId,
};

/// Review offsets (days after the study day) used without a custom plan.
pub const DEFAULT_REVIEW_OFFSETS: [u32; 3] = [1, 7, 14];

/// Largest accepted review offset, in days.
pub const MAX_REVIEW_OFFSET_DAYS: u32 = 3650;

/// Largest accepted expiry window for late reviews, in days.
pub const MAX_EXPIRY_DAYS: u32 = 3650;

/// Ascending, deduplicated review offsets in `1..=MAX_REVIEW_OFFSET_DAYS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPlan {
    offsets: Vec<u32>,
}

impl Default for ReviewPlan {
    fn default() -> Self {
        Self {
            offsets: DEFAULT_REVIEW_OFFSETS.to_vec(),
        }
    }
}

impl ReviewPlan {
    /// Build a plan from a user's custom offsets.
    ///
    /// No plan, or an empty one, falls back to the default offsets.
    pub fn from_offsets(custom: Option<&[i32]>) -> Result<Self> {
        let Some(raw) = custom.filter(|offsets| !offsets.is_empty()) else {
            return Ok(Self::default());
        };

        let mut offsets = Vec::with_capacity(raw.len());
        for offset in raw {
            match u32::try_from(*offset) {
                Ok(days) if (1..=MAX_REVIEW_OFFSET_DAYS).contains(&days) => offsets.push(days),
                _ => {
                    return Err(EngineError::validation(format!(
                        "review offsets must be between 1 and {} days, got {}",
                        MAX_REVIEW_OFFSET_DAYS, offset
                    )))
                }
            }
        }
        offsets.sort_unstable();
        offsets.dedup();
        Ok(Self { offsets })
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }
}

/// Whether a study record spawns scheduled reviews.
pub fn qualifies_for_reviews(record: &StudyRecord) -> bool {
    match record.kind {
        RecordKind::SubjectStudy => record.subject_id.is_some() && record.slot_id.is_some(),
        RecordKind::Review | RecordKind::OpenStudy => false,
    }
}

/// One new review per plan offset, dated from the record's study day.
pub fn plan_reviews(record: &StudyRecord, plan: &ReviewPlan) -> Result<Vec<NewReviewItem>> {
    if !qualifies_for_reviews(record) {
        return Ok(Vec::new());
    }

    plan.offsets()
        .iter()
        .map(|offset| {
            Ok(NewReviewItem {
                owner_id: record.owner_id,
                scheduled_date: add_days(record.studied_on, i64::from(*offset))?,
                origin_record_id: record.id,
                slot_id: record.slot_id,
            })
        })
        .collect()
}

/// Subject a completion record is filed under.
///
/// The origin record's own subject wins; otherwise the subject of the slot it
/// was linked to is borrowed.
pub fn resolve_subject(
    origin_subject: Option<SubjectId>,
    slot_subject: Option<SubjectId>,
) -> Result<SubjectId> {
    origin_subject
        .or(slot_subject)
        .ok_or_else(|| EngineError::validation("review origin has no subject"))
}

/// Check that `item` can still be completed.
pub fn ensure_completable(item: &ReviewItem) -> Result<()> {
    match item.status {
        ReviewStatus::Pending | ReviewStatus::Snoozed | ReviewStatus::Late => Ok(()),
        ReviewStatus::Done => Err(EngineError::conflict(format!(
            "review {} is already done",
            item.id
        ))),
        ReviewStatus::Expired => Err(EngineError::conflict(format!(
            "review {} has expired",
            item.id
        ))),
    }
}

/// Mark `item` done by `completion_record_id`.
pub fn complete(item: &ReviewItem, completion_record_id: RecordId) -> Result<ReviewItem> {
    ensure_completable(item)?;
    Ok(ReviewItem {
        status: ReviewStatus::Done,
        completion_record_id: Some(completion_record_id),
        ..item.clone()
    })
}

/// Check that `item` can still be moved to another day.
pub fn ensure_snoozable(item: &ReviewItem) -> Result<()> {
    match item.status {
        ReviewStatus::Done => Err(EngineError::validation(format!(
            "review {} is done and cannot be snoozed",
            item.id
        ))),
        ReviewStatus::Pending | ReviewStatus::Snoozed | ReviewStatus::Late | ReviewStatus::Expired => {
            Ok(())
        }
    }
}

/// Move `item` to `new_date`.
pub fn snooze(item: &ReviewItem, new_date: NaiveDate) -> Result<ReviewItem> {
    ensure_snoozable(item)?;
    Ok(ReviewItem {
        scheduled_date: new_date,
        status: ReviewStatus::Snoozed,
        ..item.clone()
    })
}

/// Undo a completion whose record went away.
pub fn reopen(item: &ReviewItem) -> ReviewItem {
    ReviewItem {
        status: ReviewStatus::Pending,
        completion_record_id: None,
        ..item.clone()
    }
}

/// Date side of a bulk transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// `scheduled_date < day`
    Before(NaiveDate),
    /// `scheduled_date >= day`
    OnOrAfter(NaiveDate),
}

impl Cutoff {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            Self::Before(day) => date < *day,
            Self::OnOrAfter(day) => date >= *day,
        }
    }
}

/// One of the time-driven passes run by the daily reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyPass {
    /// Pending or snoozed reviews whose day has passed become late.
    MarkLate,
    /// Late reviews older than `after_days` expire.
    Expire { after_days: u32 },
    /// Late reviews moved back to today or later become pending again.
    Restore,
}

impl DailyPass {
    /// The bulk update this pass performs on `today`.
    pub fn at(&self, today: NaiveDate) -> Result<BulkTransition> {
        Ok(match self {
            Self::MarkLate => BulkTransition {
                pass: *self,
                from: &[ReviewStatus::Pending, ReviewStatus::Snoozed],
                cutoff: Cutoff::Before(today),
                to: ReviewStatus::Late,
            },
            Self::Expire { after_days } => BulkTransition {
                pass: *self,
                from: &[ReviewStatus::Late],
                cutoff: Cutoff::Before(add_days(today, -i64::from(*after_days))?),
                to: ReviewStatus::Expired,
            },
            Self::Restore => BulkTransition {
                pass: *self,
                from: &[ReviewStatus::Late],
                cutoff: Cutoff::OnOrAfter(today),
                to: ReviewStatus::Pending,
            },
        })
    }
}

/// `UPDATE ... SET status = to WHERE status IN from AND cutoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkTransition {
    pub pass: DailyPass,
    pub from: &'static [ReviewStatus],
    pub cutoff: Cutoff,
    pub to: ReviewStatus,
}

impl BulkTransition {
    pub fn applies_to(&self, item: &ReviewItem) -> bool {
        self.from.contains(&item.status) && self.cutoff.matches(item.scheduled_date)
    }
}

/// Ordered passes for the daily reconciliation.
///
/// Marking late runs before restoring, and each pass is independent, so the
/// outcome depends only on current statuses and `today`. An expiry of zero
/// disables the expire pass; one above [`MAX_EXPIRY_DAYS`] is rejected.
pub fn daily_transitions(today: NaiveDate, expiry_days: Option<u32>) -> Result<Vec<BulkTransition>> {
    let mut passes = vec![DailyPass::MarkLate];
    if let Some(after_days) = expiry_days.filter(|days| *days > 0) {
        if after_days > MAX_EXPIRY_DAYS {
            return Err(EngineError::validation(format!(
                "review expiry must be at most {} days, got {}",
                MAX_EXPIRY_DAYS, after_days
            )));
        }
        passes.push(DailyPass::Expire { after_days });
    }
    passes.push(DailyPass::Restore);

    passes.into_iter().map(|pass| pass.at(today)).collect()
}

/// Rows touched by each daily pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReport {
    pub marked_late: u64,
    pub expired: u64,
    pub restored: u64,
}

impl TransitionReport {
    pub fn record(&mut self, pass: DailyPass, affected: u64) {
        match pass {
            DailyPass::MarkLate => self.marked_late += affected,
            DailyPass::Expire { .. } => self.expired += affected,
            DailyPass::Restore => self.restored += affected,
        }
    }

    pub fn total(&self) -> u64 {
        self.marked_late + self.expired + self.restored
    }

    pub fn merge(&mut self, other: &TransitionReport) {
        self.marked_late += other.marked_late;
        self.expired += other.expired;
        self.restored += other.restored;
    }
}

/// Run `transitions` in order over in-memory items.
pub fn apply_transitions(items: &mut [ReviewItem], transitions: &[BulkTransition]) -> TransitionReport {
    let mut report = TransitionReport::default();
    for transition in transitions {
        let mut affected = 0;
        for item in items.iter_mut().filter(|item| transition.applies_to(item)) {
            item.status = transition.to;
            affected += 1;
        }
        report.record(transition.pass, affected);
    }
    report
}

/// Filter for listing reviews.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFilter {
    pub status: Option<ReviewStatus>,
    /// Inclusive first day.
    pub from: Option<NaiveDate>,
    /// Inclusive last day.
    pub until: Option<NaiveDate>,
}

impl ReviewFilter {
    pub fn matches(&self, item: &ReviewItem) -> bool {
        self.status.map_or(true, |status| item.status == status)
            && self.from.map_or(true, |from| item.scheduled_date >= from)
            && self.until.map_or(true, |until| item.scheduled_date <= until)
    }
}
