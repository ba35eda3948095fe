use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgConnection;

use study_core::review::{BulkTransition, Cutoff, ReviewFilter};

use super::Database;
use crate::error::{is_unique_violation, Result, ServiceError};
use crate::models::{DbReviewItem, NewReviewItem, RecordId, ReviewId, ReviewItem, UserId};
use crate::repository::ReviewRepository;

const REVIEW_COLUMNS: &str =
    "id, owner_id, scheduled_date, status, origin_record_id, completion_record_id, slot_id";

// === Statements shared with the record transactions ===

pub(super) async fn insert_items(
    conn: &mut PgConnection,
    items: &[NewReviewItem],
) -> Result<Vec<ReviewItem>> {
    let mut created = Vec::with_capacity(items.len());

    for item in items {
        let row = sqlx::query_as::<_, DbReviewItem>(&format!(
            r#"
            INSERT INTO review_items (owner_id, scheduled_date, status, origin_record_id, slot_id)
            VALUES ($1, $2, 'pending', $3, $4)
            RETURNING {}
            "#,
            REVIEW_COLUMNS
        ))
        .bind(item.owner_id)
        .bind(item.scheduled_date)
        .bind(item.origin_record_id)
        .bind(item.slot_id)
        .fetch_one(&mut *conn)
        .await?;

        created.push(row.to_core()?);
    }

    Ok(created)
}

pub(super) async fn mark_done_in(
    conn: &mut PgConnection,
    user: UserId,
    id: ReviewId,
    completion: RecordId,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE review_items
        SET status = 'done', completion_record_id = $3, updated_at = NOW()
        WHERE id = $1 AND owner_id = $2 AND status NOT IN ('done', 'expired')
        "#,
    )
    .bind(id)
    .bind(user)
    .bind(completion)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(done) => Ok(done.rows_affected() == 1),
        Err(err) if is_unique_violation(&err) => Err(ServiceError::Conflict(format!(
            "record {} already completes another review",
            completion
        ))),
        Err(err) => Err(err.into()),
    }
}

/// Reopen the review completed by `record`, returning its id.
pub(super) async fn reopen_completed_in(
    conn: &mut PgConnection,
    user: UserId,
    record: RecordId,
) -> Result<Option<ReviewId>> {
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE review_items
        SET status = 'pending', completion_record_id = NULL, updated_at = NOW()
        WHERE completion_record_id = $1 AND owner_id = $2
        RETURNING id
        "#,
    )
    .bind(record)
    .bind(user)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

pub(super) async fn delete_by_origin_in(
    conn: &mut PgConnection,
    user: UserId,
    origin: RecordId,
) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM review_items WHERE origin_record_id = $1 AND owner_id = $2")
            .bind(origin)
            .bind(user)
            .execute(&mut *conn)
            .await?;

    Ok(result.rows_affected())
}

#[async_trait]
impl ReviewRepository for Database {
    async fn create(&self, items: &[NewReviewItem]) -> Result<Vec<ReviewItem>> {
        let mut tx = self.pool.begin().await?;
        let created = insert_items(&mut tx, items).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn find_owned(&self, user: UserId, id: ReviewId) -> Result<Option<ReviewItem>> {
        let row = sqlx::query_as::<_, DbReviewItem>(&format!(
            "SELECT {} FROM review_items WHERE id = $1 AND owner_id = $2",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_core()).transpose()
    }

    async fn snooze(
        &self,
        user: UserId,
        id: ReviewId,
        new_date: NaiveDate,
    ) -> Result<Option<ReviewItem>> {
        let row = sqlx::query_as::<_, DbReviewItem>(&format!(
            r#"
            UPDATE review_items
            SET scheduled_date = $3, status = 'snoozed', updated_at = NOW()
            WHERE id = $1 AND owner_id = $2 AND status <> 'done'
            RETURNING {}
            "#,
            REVIEW_COLUMNS
        ))
        .bind(id)
        .bind(user)
        .bind(new_date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_core()).transpose()
    }

    async fn bulk_transition(&self, user: UserId, transition: &BulkTransition) -> Result<u64> {
        let from: Vec<String> = transition
            .from
            .iter()
            .map(|status| status.as_str().to_string())
            .collect();

        let (comparison, day) = match transition.cutoff {
            Cutoff::Before(day) => ("<", day),
            Cutoff::OnOrAfter(day) => (">=", day),
        };

        let result = sqlx::query(&format!(
            r#"
            UPDATE review_items
            SET status = $3, updated_at = NOW()
            WHERE owner_id = $1 AND status = ANY($2) AND scheduled_date {} $4
            "#,
            comparison
        ))
        .bind(user)
        .bind(&from)
        .bind(transition.to.as_str())
        .bind(day)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list(&self, user: UserId, filter: &ReviewFilter) -> Result<Vec<ReviewItem>> {
        let rows = sqlx::query_as::<_, DbReviewItem>(&format!(
            r#"
            SELECT {}
            FROM review_items
            WHERE owner_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::date IS NULL OR scheduled_date >= $3)
              AND ($4::date IS NULL OR scheduled_date <= $4)
            ORDER BY scheduled_date, id
            "#,
            REVIEW_COLUMNS
        ))
        .bind(user)
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.from)
        .bind(filter.until)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(DbReviewItem::to_core).collect()
    }
}
