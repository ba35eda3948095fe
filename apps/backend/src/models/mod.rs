//! Database models and service input types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use study_core::calendar::{weekday_from_index, weekday_index};
use study_core::streak::StreakSummary;

// Re-export shared types from study-core
pub use study_core::types::{
    GracePolicy, NewReviewItem, RecordId, RecordKind, ReviewId, ReviewItem, ReviewStatus,
    ScheduleSlot, SlotId, SlotPolicy, SlotStatus, StreakState, StudyRecord, SubjectId, UserId,
    UserPreferences,
};

use crate::error::{Result, ServiceError};

// === Database Entity Types ===

/// Study record stored in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbStudyRecord {
    pub id: i64,
    pub owner_id: i64,
    pub kind: String,
    pub studied_on: NaiveDate,
    pub minutes: i32,
    pub notes: Option<String>,
    pub subject_id: Option<i64>,
    pub slot_id: Option<i64>,
}

impl DbStudyRecord {
    pub fn to_core(&self) -> Result<StudyRecord> {
        let kind = RecordKind::from_str(&self.kind).ok_or_else(|| {
            ServiceError::Internal(format!("unknown record kind '{}'", self.kind))
        })?;

        Ok(StudyRecord {
            id: self.id,
            owner_id: self.owner_id,
            kind,
            studied_on: self.studied_on,
            minutes: self.minutes,
            notes: self.notes.clone(),
            subject_id: self.subject_id,
            slot_id: self.slot_id,
        })
    }
}

/// Scheduled review stored in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbReviewItem {
    pub id: i64,
    pub owner_id: i64,
    pub scheduled_date: NaiveDate,
    pub status: String,
    pub origin_record_id: i64,
    pub completion_record_id: Option<i64>,
    pub slot_id: Option<i64>,
}

impl DbReviewItem {
    pub fn to_core(&self) -> Result<ReviewItem> {
        let status = ReviewStatus::from_str(&self.status).ok_or_else(|| {
            ServiceError::Internal(format!("unknown review status '{}'", self.status))
        })?;

        Ok(ReviewItem {
            id: self.id,
            owner_id: self.owner_id,
            scheduled_date: self.scheduled_date,
            status,
            origin_record_id: self.origin_record_id,
            completion_record_id: self.completion_record_id,
            slot_id: self.slot_id,
        })
    }
}

/// Weekly schedule slot stored in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbScheduleSlot {
    pub id: i64,
    pub owner_id: i64,
    pub weekday: i16,
    pub position: i32,
    pub subject_id: i64,
    pub created_on: NaiveDate,
}

impl DbScheduleSlot {
    pub fn to_core(&self) -> Result<ScheduleSlot> {
        let weekday = u8::try_from(self.weekday)
            .ok()
            .and_then(weekday_from_index)
            .ok_or_else(|| {
                ServiceError::Internal(format!("slot {} has weekday {}", self.id, self.weekday))
            })?;

        Ok(ScheduleSlot {
            id: self.id,
            owner_id: self.owner_id,
            weekday,
            position: self.position,
            subject_id: self.subject_id,
            created_on: self.created_on,
        })
    }
}

/// Streak columns of the users table
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DbStreak {
    pub streak_current: i32,
    pub streak_blocks_total: i32,
    pub streak_blocks_used: i32,
    pub streak_last_active_day: Option<NaiveDate>,
    pub streak_evaluated_on: Option<NaiveDate>,
}

impl DbStreak {
    pub fn from_core_state(state: &StreakState) -> Self {
        Self {
            streak_current: state.current as i32,
            streak_blocks_total: state.blocks_total as i32,
            streak_blocks_used: state.blocks_used as i32,
            streak_last_active_day: state.last_active_day,
            streak_evaluated_on: state.evaluated_on,
        }
    }

    pub fn to_core_state(&self) -> StreakState {
        StreakState {
            current: self.streak_current.max(0) as u32,
            blocks_total: self.streak_blocks_total.max(0) as u32,
            blocks_used: self.streak_blocks_used.max(0) as u32,
            last_active_day: self.streak_last_active_day,
            evaluated_on: self.streak_evaluated_on,
        }
    }
}

/// Preference columns of the users table
#[derive(Debug, Clone, FromRow)]
pub struct DbPreferences {
    pub first_day_of_week: i16,
    pub review_offsets: Option<Vec<i32>>,
    pub grace_blocks: i32,
    pub review_recovery: bool,
    pub review_expiry_days: Option<i32>,
    pub slot_tolerance_days: i32,
    pub slot_max_late_days: i32,
}

impl DbPreferences {
    /// Day counts outside the supported range are a validation error.
    pub fn to_core(&self) -> Result<UserPreferences> {
        let defaults = UserPreferences::default();
        let first_day_of_week = u8::try_from(self.first_day_of_week)
            .ok()
            .and_then(weekday_from_index)
            .unwrap_or(defaults.first_day_of_week);

        let prefs = UserPreferences {
            first_day_of_week,
            review_offsets: self.review_offsets.clone(),
            grace: GracePolicy {
                blocks_total: self.grace_blocks.max(0) as u32,
                review_recovery: self.review_recovery,
            },
            review_expiry_days: self
                .review_expiry_days
                .filter(|days| *days > 0)
                .map(|days| days as u32),
            slot_policy: SlotPolicy {
                tolerance_days: self.slot_tolerance_days.max(0) as u32,
                max_late_days: self.slot_max_late_days.max(0) as u32,
            },
        };
        prefs.validate()?;
        Ok(prefs)
    }

    pub fn from_core(prefs: &UserPreferences) -> Self {
        Self {
            first_day_of_week: i16::from(weekday_index(prefs.first_day_of_week)),
            review_offsets: prefs.review_offsets.clone(),
            grace_blocks: prefs.grace.blocks_total as i32,
            review_recovery: prefs.grace.review_recovery,
            review_expiry_days: prefs.review_expiry_days.map(|days| days as i32),
            slot_tolerance_days: prefs.slot_policy.tolerance_days as i32,
            slot_max_late_days: prefs.slot_policy.max_late_days as i32,
        }
    }
}

// === Service Input and Output Types ===

/// Study record about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudyRecord {
    pub owner_id: UserId,
    pub kind: RecordKind,
    pub studied_on: NaiveDate,
    pub minutes: i32,
    pub notes: Option<String>,
    pub subject_id: Option<SubjectId>,
    pub slot_id: Option<SlotId>,
}

/// Request to log a study session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRequest {
    pub kind: RecordKind,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub studied_on: String,
    pub minutes: i32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub slot_id: Option<SlotId>,
    /// Review completed by this record (`kind = review` only).
    #[serde(default)]
    pub review_id: Option<ReviewId>,
}

/// Everything that changed when a study record was logged.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub record: StudyRecord,
    pub scheduled_reviews: Vec<ReviewItem>,
    pub completed_review: Option<ReviewItem>,
    pub streak: StreakSummary,
}

/// Review rows touched while deleting a study record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCascade {
    /// Review the deleted record had completed, now pending again.
    pub reopened_review: Option<ReviewId>,
    /// Reviews the deleted record had generated.
    pub removed_reviews: u64,
}

/// Everything that changed when a study record was deleted.
#[derive(Debug, Clone, Serialize)]
pub struct RecordDeletion {
    pub record_id: RecordId,
    pub reopened_review: Option<ReviewId>,
    pub removed_reviews: u64,
    pub streak: StreakSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn test_streak_row_round_trip() {
        let state = StreakState {
            current: 5,
            blocks_total: 2,
            blocks_used: 1,
            last_active_day: Some(day(7)),
            evaluated_on: Some(day(8)),
        };
        assert_eq!(DbStreak::from_core_state(&state).to_core_state(), state);
    }

    #[test]
    fn test_review_row_with_unknown_status_is_internal() {
        let row = DbReviewItem {
            id: 1,
            owner_id: 1,
            scheduled_date: day(8),
            status: "archived".to_string(),
            origin_record_id: 2,
            completion_record_id: None,
            slot_id: None,
        };
        assert!(matches!(row.to_core(), Err(ServiceError::Internal(_))));
    }

    #[test]
    fn test_slot_weekday_uses_sunday_zero() {
        let row = DbScheduleSlot {
            id: 3,
            owner_id: 1,
            weekday: 0,
            position: 1,
            subject_id: 4,
            created_on: day(1),
        };
        assert_eq!(row.to_core().unwrap().weekday, Weekday::Sun);

        let bad = DbScheduleSlot { weekday: 9, ..row };
        assert!(bad.to_core().is_err());
    }

    #[test]
    fn test_preferences_round_trip() {
        let prefs = UserPreferences {
            first_day_of_week: Weekday::Sun,
            review_offsets: Some(vec![2, 5]),
            grace: GracePolicy {
                blocks_total: 3,
                review_recovery: false,
            },
            review_expiry_days: Some(30),
            slot_policy: SlotPolicy {
                tolerance_days: 1,
                max_late_days: 5,
            },
        };
        assert_eq!(DbPreferences::from_core(&prefs).to_core().unwrap(), prefs);
    }

    #[test]
    fn test_non_positive_expiry_disables_expiry() {
        let mut row = DbPreferences::from_core(&UserPreferences::default());
        row.review_expiry_days = Some(0);
        assert_eq!(row.to_core().unwrap().review_expiry_days, None);
    }

    #[test]
    fn test_out_of_range_preferences_are_rejected() {
        let defaults = DbPreferences::from_core(&UserPreferences::default());
        let rows = [
            DbPreferences {
                review_offsets: Some(vec![1, 200_000_000]),
                ..defaults.clone()
            },
            DbPreferences {
                review_expiry_days: Some(2_000_000_000),
                ..defaults.clone()
            },
            DbPreferences {
                slot_tolerance_days: i32::MAX,
                ..defaults.clone()
            },
            DbPreferences {
                slot_max_late_days: 100_000,
                ..defaults
            },
        ];

        for row in rows {
            assert!(matches!(row.to_core(), Err(ServiceError::Validation(_))));
        }
    }
}
