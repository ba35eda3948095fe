//! Storage contracts used by the services.
//!
//! `db::Database` implements every trait against PostgreSQL. Conditional
//! updates report whether a row matched so callers can turn lost races into
//! conflicts instead of overwriting each other. Record writes that touch
//! reviews run as one transaction: either every row lands or none does.

use async_trait::async_trait;
use chrono::NaiveDate;

use study_core::review::{BulkTransition, ReviewFilter, ReviewPlan};

use crate::error::Result;
use crate::models::{
    NewReviewItem, NewStudyRecord, RecordCascade, RecordId, ReviewId, ReviewItem, ScheduleSlot,
    SlotId, StreakState, StudyRecord, SubjectId, UserId, UserPreferences,
};

/// Activity history feeding the streak engine.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Distinct days on or after `since` with at least one study record.
    async fn list_distinct_days(&self, user: UserId, since: NaiveDate) -> Result<Vec<NaiveDate>>;

    /// One entry per review completion on or after `since`, keyed by the
    /// completion record's day.
    async fn list_review_completion_days(
        &self,
        user: UserId,
        since: NaiveDate,
    ) -> Result<Vec<NaiveDate>>;
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn insert_record(&self, record: &NewStudyRecord) -> Result<StudyRecord>;

    /// Insert `record` together with the reviews `plan` derives from it.
    async fn insert_record_with_reviews(
        &self,
        record: &NewStudyRecord,
        plan: &ReviewPlan,
    ) -> Result<(StudyRecord, Vec<ReviewItem>)>;

    /// Insert the completion record of `review` and mark the review done.
    /// A review that is already done, expired or missing is a conflict and
    /// leaves nothing behind.
    async fn insert_completion(
        &self,
        record: &NewStudyRecord,
        review: ReviewId,
    ) -> Result<StudyRecord>;

    async fn find_record(&self, user: UserId, id: RecordId) -> Result<Option<StudyRecord>>;

    /// Reopen the review `id` completed, drop the reviews it generated, then
    /// delete it. `None` when no owned record matched.
    async fn delete_record_cascade(
        &self,
        user: UserId,
        id: RecordId,
    ) -> Result<Option<RecordCascade>>;

    async fn subject_owned(&self, user: UserId, subject: SubjectId) -> Result<bool>;
}

#[async_trait]
pub trait StreakRepository: Send + Sync {
    async fn read(&self, user: UserId) -> Result<StreakState>;

    async fn write(&self, user: UserId, state: &StreakState) -> Result<()>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(&self, items: &[NewReviewItem]) -> Result<Vec<ReviewItem>>;

    async fn find_owned(&self, user: UserId, id: ReviewId) -> Result<Option<ReviewItem>>;

    /// Move a review that is not done. `None` when nothing matched.
    async fn snooze(
        &self,
        user: UserId,
        id: ReviewId,
        new_date: NaiveDate,
    ) -> Result<Option<ReviewItem>>;

    /// Run one daily pass as a single update. Returns the affected rows.
    async fn bulk_transition(&self, user: UserId, transition: &BulkTransition) -> Result<u64>;

    /// Ordered by scheduled date, then id.
    async fn list(&self, user: UserId, filter: &ReviewFilter) -> Result<Vec<ReviewItem>>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Id of the user's schedule, creating it when missing.
    async fn ensure_schedule(&self, user: UserId) -> Result<i64>;

    async fn list_slots(&self, user: UserId) -> Result<Vec<ScheduleSlot>>;

    async fn find_slot(&self, user: UserId, slot: SlotId) -> Result<Option<ScheduleSlot>>;

    /// `(slot, day)` pairs of subject study records linked to `slots` within
    /// `[week_start, week_end)`.
    async fn list_same_day_completions(
        &self,
        user: UserId,
        slots: &[SlotId],
        week_start: NaiveDate,
        week_end: NaiveDate,
    ) -> Result<Vec<(SlotId, NaiveDate)>>;
}

#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    async fn get(&self, user: UserId) -> Result<UserPreferences>;

    async fn list_user_ids(&self) -> Result<Vec<UserId>>;
}

/// Every repository the services need, behind one bound.
pub trait Store:
    ActivityRepository
    + RecordRepository
    + StreakRepository
    + ReviewRepository
    + ScheduleRepository
    + PreferencesRepository
{
}

impl<T> Store for T where
    T: ActivityRepository
        + RecordRepository
        + StreakRepository
        + ReviewRepository
        + ScheduleRepository
        + PreferencesRepository
{
}
