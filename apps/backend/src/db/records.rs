use async_trait::async_trait;
use sqlx::PgConnection;

use study_core::review::{self, ReviewPlan};

use super::reviews::{delete_by_origin_in, insert_items, mark_done_in, reopen_completed_in};
use super::Database;
use crate::error::{Result, ServiceError};
use crate::models::{
    DbStudyRecord, NewStudyRecord, RecordCascade, RecordId, ReviewId, ReviewItem, StudyRecord,
    SubjectId, UserId,
};
use crate::repository::RecordRepository;

async fn insert_record_in(conn: &mut PgConnection, record: &NewStudyRecord) -> Result<StudyRecord> {
    let row = sqlx::query_as::<_, DbStudyRecord>(
        r#"
        INSERT INTO study_records (owner_id, kind, studied_on, minutes, notes, subject_id, slot_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, owner_id, kind, studied_on, minutes, notes, subject_id, slot_id
        "#,
    )
    .bind(record.owner_id)
    .bind(record.kind.as_str())
    .bind(record.studied_on)
    .bind(record.minutes)
    .bind(record.notes.as_deref())
    .bind(record.subject_id)
    .bind(record.slot_id)
    .fetch_one(&mut *conn)
    .await?;

    row.to_core()
}

async fn delete_record_in(conn: &mut PgConnection, user: UserId, id: RecordId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM study_records WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(user)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl RecordRepository for Database {
    async fn insert_record(&self, record: &NewStudyRecord) -> Result<StudyRecord> {
        let mut conn = self.pool.acquire().await?;
        insert_record_in(&mut conn, record).await
    }

    async fn insert_record_with_reviews(
        &self,
        record: &NewStudyRecord,
        plan: &ReviewPlan,
    ) -> Result<(StudyRecord, Vec<ReviewItem>)> {
        let mut tx = self.pool.begin().await?;

        let inserted = insert_record_in(&mut tx, record).await?;
        let planned = review::plan_reviews(&inserted, plan)?;
        let created = insert_items(&mut tx, &planned).await?;

        tx.commit().await?;
        Ok((inserted, created))
    }

    async fn insert_completion(
        &self,
        record: &NewStudyRecord,
        review: ReviewId,
    ) -> Result<StudyRecord> {
        let mut tx = self.pool.begin().await?;

        let inserted = insert_record_in(&mut tx, record).await?;
        if !mark_done_in(&mut tx, record.owner_id, review, inserted.id).await? {
            tx.rollback().await?;
            return Err(ServiceError::Conflict(format!(
                "review {} was completed concurrently",
                review
            )));
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn find_record(&self, user: UserId, id: RecordId) -> Result<Option<StudyRecord>> {
        let row = sqlx::query_as::<_, DbStudyRecord>(
            r#"
            SELECT id, owner_id, kind, studied_on, minutes, notes, subject_id, slot_id
            FROM study_records
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_core()).transpose()
    }

    async fn delete_record_cascade(
        &self,
        user: UserId,
        id: RecordId,
    ) -> Result<Option<RecordCascade>> {
        let mut tx = self.pool.begin().await?;

        let reopened_review = reopen_completed_in(&mut tx, user, id).await?;
        let removed_reviews = delete_by_origin_in(&mut tx, user, id).await?;
        if !delete_record_in(&mut tx, user, id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(RecordCascade {
            reopened_review,
            removed_reviews,
        }))
    }

    async fn subject_owned(&self, user: UserId, subject: SubjectId) -> Result<bool> {
        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM subjects WHERE id = $1 AND owner_id = $2)",
        )
        .bind(subject)
        .bind(user)
        .fetch_one(&self.pool)
        .await?;

        Ok(owned)
    }
}
