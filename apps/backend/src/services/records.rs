//! Logging and deleting study records.
//!
//! A new record may schedule reviews (subject study on a slot) or complete one
//! (review), and always triggers a streak recompute. Deleting a record undoes
//! both effects before recomputing. The record and its review rows are
//! written in one repository transaction.

use std::sync::Arc;

use chrono::NaiveDate;

use study_core::calendar::parse_iso_date;
use study_core::review::{self, ReviewPlan};

use crate::error::{Result, ServiceError};
use crate::models::{
    NewStudyRecord, RecordDeletion, RecordId, RecordKind, RecordOutcome, RecordRequest,
    SubjectId, UserId,
};
use crate::repository::Store;
use crate::services::reviews::ReviewService;
use crate::services::streak::StreakService;

pub struct RecordService<S> {
    store: Arc<S>,
    reviews: ReviewService<S>,
    streak: StreakService<S>,
}

impl<S: Store> RecordService<S> {
    pub fn new(store: Arc<S>, lookback_days: u32) -> Self {
        Self {
            reviews: ReviewService::new(store.clone()),
            streak: StreakService::new(store.clone(), lookback_days),
            store,
        }
    }

    /// Log a study session for `user`.
    pub async fn create(
        &self,
        user: UserId,
        request: &RecordRequest,
        today: NaiveDate,
    ) -> Result<RecordOutcome> {
        let studied_on = parse_iso_date(&request.studied_on)?;
        if request.minutes <= 0 {
            return Err(ServiceError::Validation(format!(
                "minutes must be positive, got {}",
                request.minutes
            )));
        }

        let prefs = self.store.get(user).await?;
        let plan = ReviewPlan::from_offsets(prefs.review_offsets.as_deref())?;

        let mut new_record = NewStudyRecord {
            owner_id: user,
            kind: request.kind,
            studied_on,
            minutes: request.minutes,
            notes: request.notes.clone(),
            subject_id: None,
            slot_id: None,
        };

        let (record, scheduled_reviews, completed_review) = match request.kind {
            RecordKind::SubjectStudy => {
                if request.review_id.is_some() {
                    return Err(ServiceError::Validation(
                        "subject study cannot complete a review".to_string(),
                    ));
                }
                let subject = request.subject_id.ok_or_else(|| {
                    ServiceError::Validation("subject study requires a subject".to_string())
                })?;
                let slot_id = request.slot_id.ok_or_else(|| {
                    ServiceError::Validation("subject study requires a schedule slot".to_string())
                })?;

                self.ensure_subject(user, subject).await?;
                let slot = self
                    .store
                    .find_slot(user, slot_id)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("slot {}", slot_id)))?;
                if slot.subject_id != subject {
                    return Err(ServiceError::Validation(format!(
                        "slot {} is assigned to subject {}, not {}",
                        slot_id, slot.subject_id, subject
                    )));
                }

                new_record.subject_id = Some(subject);
                new_record.slot_id = Some(slot_id);
                let (record, scheduled) = self
                    .store
                    .insert_record_with_reviews(&new_record, &plan)
                    .await?;
                tracing::info!(
                    user_id = user,
                    record_id = record.id,
                    count = scheduled.len(),
                    "Scheduled reviews"
                );
                (record, scheduled, None)
            }
            RecordKind::Review => {
                let review_id = request.review_id.ok_or_else(|| {
                    ServiceError::Validation("review record requires a review".to_string())
                })?;
                let (item, subject) = self.reviews.prepare_completion(user, review_id).await?;

                new_record.subject_id = Some(subject);
                new_record.slot_id = item.slot_id;
                let record = self.store.insert_completion(&new_record, item.id).await?;
                let done = review::complete(&item, record.id)?;
                tracing::info!(
                    user_id = user,
                    review_id = item.id,
                    record_id = record.id,
                    "Review completed"
                );
                (record, Vec::new(), Some(done))
            }
            RecordKind::OpenStudy => {
                if request.review_id.is_some() {
                    return Err(ServiceError::Validation(
                        "open study cannot complete a review".to_string(),
                    ));
                }
                if request.slot_id.is_some() {
                    return Err(ServiceError::Validation(
                        "open study cannot be linked to a schedule slot".to_string(),
                    ));
                }
                if let Some(subject) = request.subject_id {
                    self.ensure_subject(user, subject).await?;
                }

                new_record.subject_id = request.subject_id;
                let record = self.store.insert_record(&new_record).await?;
                (record, Vec::new(), None)
            }
        };

        let streak = self.streak.recompute(user, today).await?;

        tracing::info!(
            user_id = user,
            record_id = record.id,
            kind = record.kind.as_str(),
            studied_on = %record.studied_on,
            streak = streak.current,
            "Study record created"
        );

        Ok(RecordOutcome {
            record,
            scheduled_reviews,
            completed_review,
            streak,
        })
    }

    /// Delete a study record and undo its effects.
    pub async fn delete(&self, user: UserId, id: RecordId, today: NaiveDate) -> Result<RecordDeletion> {
        let cascade = self
            .store
            .delete_record_cascade(user, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("record {}", id)))?;

        if let Some(review_id) = cascade.reopened_review {
            tracing::info!(user_id = user, review_id, record_id = id, "Review reopened");
        }

        let streak = self.streak.recompute(user, today).await?;

        tracing::info!(
            user_id = user,
            record_id = id,
            removed_reviews = cascade.removed_reviews,
            streak = streak.current,
            "Study record deleted"
        );

        Ok(RecordDeletion {
            record_id: id,
            reopened_review: cascade.reopened_review,
            removed_reviews: cascade.removed_reviews,
            streak,
        })
    }

    async fn ensure_subject(&self, user: UserId, subject: SubjectId) -> Result<()> {
        if self.store.subject_owned(user, subject).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("subject {}", subject)))
        }
    }
}
