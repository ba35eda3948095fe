//! Scheduled review operations over the review repository.

use std::sync::Arc;

use chrono::NaiveDate;

use study_core::review::{self, daily_transitions, ReviewFilter, TransitionReport};

use crate::error::{Result, ServiceError};
use crate::models::{ReviewId, ReviewItem, SubjectId, UserId};
use crate::repository::{
    PreferencesRepository, RecordRepository, ReviewRepository, ScheduleRepository,
};

pub struct ReviewService<S> {
    store: Arc<S>,
}

impl<S> ReviewService<S>
where
    S: ReviewRepository + RecordRepository + ScheduleRepository + PreferencesRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Load an owned review that can still be completed, together with the
    /// subject its completion record is filed under.
    pub async fn prepare_completion(
        &self,
        user: UserId,
        id: ReviewId,
    ) -> Result<(ReviewItem, SubjectId)> {
        let item = self.find(user, id).await?;
        review::ensure_completable(&item)?;

        let origin = self
            .store
            .find_record(user, item.origin_record_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("origin record {}", item.origin_record_id))
            })?;

        let slot_subject = match origin.subject_id {
            Some(_) => None,
            None => match origin.slot_id.or(item.slot_id) {
                Some(slot) => self
                    .store
                    .find_slot(user, slot)
                    .await?
                    .map(|slot| slot.subject_id),
                None => None,
            },
        };

        let subject = review::resolve_subject(origin.subject_id, slot_subject)?;
        Ok((item, subject))
    }

    /// Move a review to another day.
    pub async fn snooze(&self, user: UserId, id: ReviewId, new_date: NaiveDate) -> Result<ReviewItem> {
        let item = self.find(user, id).await?;
        review::ensure_snoozable(&item)?;

        let snoozed = self
            .store
            .snooze(user, id, new_date)
            .await?
            .ok_or_else(|| ServiceError::Conflict(format!("review {} was completed concurrently", id)))?;

        tracing::info!(user_id = user, review_id = id, new_date = %new_date, "Review snoozed");
        Ok(snoozed)
    }

    /// Run the daily status passes for one user.
    pub async fn reconcile(&self, user: UserId, today: NaiveDate) -> Result<TransitionReport> {
        let prefs = self.store.get(user).await?;
        let mut report = TransitionReport::default();

        for transition in daily_transitions(today, prefs.review_expiry_days)? {
            let affected = self.store.bulk_transition(user, &transition).await?;
            report.record(transition.pass, affected);
        }

        if report.total() > 0 {
            tracing::debug!(
                user_id = user,
                marked_late = report.marked_late,
                expired = report.expired,
                restored = report.restored,
                "Reconciled review statuses"
            );
        }
        Ok(report)
    }

    /// Reconcile, then list the user's reviews matching `filter`.
    pub async fn list(
        &self,
        user: UserId,
        filter: &ReviewFilter,
        today: NaiveDate,
    ) -> Result<Vec<ReviewItem>> {
        if let (Some(from), Some(until)) = (filter.from, filter.until) {
            if from > until {
                return Err(ServiceError::Validation(format!(
                    "date range starts after it ends ({} > {})",
                    from, until
                )));
            }
        }

        self.reconcile(user, today).await?;
        self.store.list(user, filter).await
    }

    async fn find(&self, user: UserId, id: ReviewId) -> Result<ReviewItem> {
        self.store
            .find_owned(user, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("review {}", id)))
    }
}
