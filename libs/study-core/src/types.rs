//! Core types shared by the engine and its callers.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::review::{ReviewPlan, MAX_EXPIRY_DAYS};
use crate::streak::{clamp_blocks, DEFAULT_BLOCKS};

pub type UserId = i64;
pub type RecordId = i64;
pub type ReviewId = i64;
pub type SlotId = i64;
pub type SubjectId = i64;

/// Lifecycle status of a scheduled review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Snoozed,
    Late,
    Done,
    Expired,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ReviewStatus {
    /// Get the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Snoozed => "snoozed",
            Self::Late => "late",
            Self::Done => "done",
            Self::Expired => "expired",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "snoozed" => Some(Self::Snoozed),
            "late" => Some(Self::Late),
            "done" => Some(Self::Done),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Terminal states never re-enter the automatic daily cycle.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Done | Self::Expired => true,
            Self::Pending | Self::Snoozed | Self::Late => false,
        }
    }
}

/// Status of a weekly slot inside a projected week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Completed,
    Pending,
    Late,
}

/// Kind of a study record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Studying the subject of a weekly slot. Spawns scheduled reviews.
    SubjectStudy,
    /// Completing a scheduled review.
    Review,
    /// Free study outside the plan. Counts as activity only.
    OpenStudy,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubjectStudy => "subject_study",
            Self::Review => "review",
            Self::OpenStudy => "open_study",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "subject_study" => Some(Self::SubjectStudy),
            "review" => Some(Self::Review),
            "open_study" => Some(Self::OpenStudy),
            _ => None,
        }
    }
}

/// Persisted per-user streak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current: u32,
    pub blocks_total: u32,
    pub blocks_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_day: Option<NaiveDate>,
    /// Day the stored `blocks_used` was charged up to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_on: Option<NaiveDate>,
}

impl StreakState {
    /// Empty streak with the given grace budget.
    pub fn empty(blocks_total: u32) -> Self {
        Self {
            current: 0,
            blocks_total: clamp_blocks(blocks_total),
            blocks_used: 0,
            last_active_day: None,
            evaluated_on: None,
        }
    }
}

impl Default for StreakState {
    fn default() -> Self {
        Self::empty(DEFAULT_BLOCKS)
    }
}

/// A scheduled spaced-repetition review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: ReviewId,
    pub owner_id: UserId,
    pub scheduled_date: NaiveDate,
    pub status: ReviewStatus,
    pub origin_record_id: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_record_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<SlotId>,
}

/// Review about to be inserted (no ID yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReviewItem {
    pub owner_id: UserId,
    pub scheduled_date: NaiveDate,
    pub origin_record_id: RecordId,
    pub slot_id: Option<SlotId>,
}

/// Recurring weekday assignment inside the weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: SlotId,
    pub owner_id: UserId,
    pub weekday: Weekday,
    pub position: i32,
    pub subject_id: SubjectId,
    pub created_on: NaiveDate,
}

/// A logged study session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub id: RecordId,
    pub owner_id: UserId,
    pub kind: RecordKind,
    pub studied_on: NaiveDate,
    pub minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<SlotId>,
}

/// Grace-block policy for the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePolicy {
    pub blocks_total: u32,
    /// Completing a review on an active day returns one consumed block.
    pub review_recovery: bool,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self {
            blocks_total: DEFAULT_BLOCKS,
            review_recovery: true,
        }
    }
}

impl GracePolicy {
    /// Budget clamped into the supported range.
    pub fn budget(&self) -> u32 {
        clamp_blocks(self.blocks_total)
    }
}

/// How long a missed weekly slot is reported as late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPolicy {
    /// Days after the target date before a slot counts as late.
    pub tolerance_days: u32,
    /// Days a slot stays late before it is shown as pending again.
    pub max_late_days: u32,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            tolerance_days: 0,
            max_late_days: 7,
        }
    }
}

impl SlotPolicy {
    /// Upper bound for both windows, in days.
    pub const MAX_WINDOW_DAYS: u32 = 365;

    pub fn validate(&self) -> Result<()> {
        for (name, days) in [
            ("slot tolerance", self.tolerance_days),
            ("slot late window", self.max_late_days),
        ] {
            if days > Self::MAX_WINDOW_DAYS {
                return Err(EngineError::validation(format!(
                    "{} must be at most {} days, got {}",
                    name,
                    Self::MAX_WINDOW_DAYS,
                    days
                )));
            }
        }
        Ok(())
    }
}

/// Per-user preferences consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub first_day_of_week: Weekday,
    /// Custom review plan in days after the study day. None uses the default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_offsets: Option<Vec<i32>>,
    pub grace: GracePolicy,
    /// Late reviews older than this many days expire. None disables expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_expiry_days: Option<u32>,
    pub slot_policy: SlotPolicy,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            first_day_of_week: Weekday::Mon,
            review_offsets: None,
            grace: GracePolicy::default(),
            review_expiry_days: None,
            slot_policy: SlotPolicy::default(),
        }
    }
}

impl UserPreferences {
    /// Reject day counts the engine cannot place on the calendar.
    pub fn validate(&self) -> Result<()> {
        ReviewPlan::from_offsets(self.review_offsets.as_deref())?;
        if let Some(days) = self.review_expiry_days {
            if days > MAX_EXPIRY_DAYS {
                return Err(EngineError::validation(format!(
                    "review expiry must be at most {} days, got {}",
                    MAX_EXPIRY_DAYS, days
                )));
            }
        }
        self.slot_policy.validate()
    }
}
