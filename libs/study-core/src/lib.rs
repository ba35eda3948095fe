//! Temporal consistency engine for study tracking.
//!
//! Provides:
//! - Calendar arithmetic on whole days in one reference timezone
//! - Streak computation with bounded grace blocks
//! - Scheduled review lifecycle and its daily status passes
//! - Projection of the weekly schedule onto a concrete week
//!
//! Everything here is pure and synchronous; persistence lives in the backend.

pub mod calendar;
pub mod error;
pub mod review;
pub mod schedule;
pub mod streak;
pub mod types;

pub use error::{EngineError, Result};
pub use review::{
    apply_transitions, daily_transitions, plan_reviews, BulkTransition, Cutoff, DailyPass,
    ReviewFilter, ReviewPlan, TransitionReport,
};
pub use schedule::{project_week, ProjectedSlot, SameDayCompletions, WeekWindow, WeeklyProjection};
pub use streak::{collect_activity, recompute, reconcile, ActivityDay, StreakSummary};
pub use types::{
    GracePolicy, NewReviewItem, RecordKind, ReviewItem, ReviewStatus, ScheduleSlot, SlotPolicy,
    SlotStatus, StreakState, StudyRecord, UserPreferences,
};
