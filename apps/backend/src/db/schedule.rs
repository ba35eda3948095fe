use async_trait::async_trait;
use chrono::NaiveDate;

use super::Database;
use crate::error::{is_unique_violation, Result, ServiceError};
use crate::models::{DbScheduleSlot, ScheduleSlot, SlotId, UserId};
use crate::repository::ScheduleRepository;

impl Database {
    async fn find_schedule_id(&self, user: UserId) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM weekly_schedules WHERE owner_id = $1")
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl ScheduleRepository for Database {
    async fn ensure_schedule(&self, user: UserId) -> Result<i64> {
        if let Some(id) = self.find_schedule_id(user).await? {
            return Ok(id);
        }

        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO weekly_schedules (owner_id) VALUES ($1) RETURNING id",
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(id) => {
                tracing::debug!(user_id = user, schedule_id = id, "Created weekly schedule");
                Ok(id)
            }
            // Another request created it first.
            Err(err) if is_unique_violation(&err) => self
                .find_schedule_id(user)
                .await?
                .ok_or_else(|| ServiceError::Internal(format!("schedule for user {} vanished", user))),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_slots(&self, user: UserId) -> Result<Vec<ScheduleSlot>> {
        let rows = sqlx::query_as::<_, DbScheduleSlot>(
            r#"
            SELECT id, owner_id, weekday, position, subject_id, created_on
            FROM schedule_slots
            WHERE owner_id = $1
            ORDER BY weekday, position, id
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(DbScheduleSlot::to_core).collect()
    }

    async fn find_slot(&self, user: UserId, slot: SlotId) -> Result<Option<ScheduleSlot>> {
        let row = sqlx::query_as::<_, DbScheduleSlot>(
            r#"
            SELECT id, owner_id, weekday, position, subject_id, created_on
            FROM schedule_slots
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(slot)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_core()).transpose()
    }

    async fn list_same_day_completions(
        &self,
        user: UserId,
        slots: &[SlotId],
        week_start: NaiveDate,
        week_end: NaiveDate,
    ) -> Result<Vec<(SlotId, NaiveDate)>> {
        if slots.is_empty() {
            return Ok(Vec::new());
        }

        let pairs = sqlx::query_as::<_, (i64, NaiveDate)>(
            r#"
            SELECT DISTINCT slot_id, studied_on
            FROM study_records
            WHERE owner_id = $1
              AND kind = 'subject_study'
              AND slot_id = ANY($2)
              AND studied_on >= $3 AND studied_on < $4
            "#,
        )
        .bind(user)
        .bind(slots)
        .bind(week_start)
        .bind(week_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(pairs)
    }
}
