//! PostgreSQL database operations

mod records;
mod reviews;
mod schedule;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::{Result, ServiceError};
use crate::models::{DbPreferences, DbStreak, StreakState, UserId, UserPreferences};
use crate::repository::{ActivityRepository, PreferencesRepository, StreakRepository};

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ServiceError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// === Activity Repository ===

#[async_trait]
impl ActivityRepository for Database {
    async fn list_distinct_days(&self, user: UserId, since: NaiveDate) -> Result<Vec<NaiveDate>> {
        let days = sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT DISTINCT studied_on
            FROM study_records
            WHERE owner_id = $1 AND studied_on >= $2
            ORDER BY studied_on
            "#,
        )
        .bind(user)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(days)
    }

    async fn list_review_completion_days(
        &self,
        user: UserId,
        since: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let days = sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT r.studied_on
            FROM study_records r
            JOIN review_items i ON i.completion_record_id = r.id
            WHERE r.owner_id = $1 AND r.studied_on >= $2
            ORDER BY r.studied_on
            "#,
        )
        .bind(user)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(days)
    }
}

// === Streak Repository ===

#[async_trait]
impl StreakRepository for Database {
    async fn read(&self, user: UserId) -> Result<StreakState> {
        let row = sqlx::query_as::<_, DbStreak>(
            r#"
            SELECT streak_current, streak_blocks_total, streak_blocks_used,
                   streak_last_active_day, streak_evaluated_on
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user {}", user)))?;

        Ok(row.to_core_state())
    }

    async fn write(&self, user: UserId, state: &StreakState) -> Result<()> {
        let row = DbStreak::from_core_state(state);
        let result = sqlx::query(
            r#"
            UPDATE users
            SET streak_current = $2,
                streak_blocks_total = $3,
                streak_blocks_used = $4,
                streak_last_active_day = $5,
                streak_evaluated_on = $6
            WHERE id = $1
            "#,
        )
        .bind(user)
        .bind(row.streak_current)
        .bind(row.streak_blocks_total)
        .bind(row.streak_blocks_used)
        .bind(row.streak_last_active_day)
        .bind(row.streak_evaluated_on)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!("user {}", user)));
        }
        Ok(())
    }
}

// === Preferences Repository ===

#[async_trait]
impl PreferencesRepository for Database {
    async fn get(&self, user: UserId) -> Result<UserPreferences> {
        let row = sqlx::query_as::<_, DbPreferences>(
            r#"
            SELECT first_day_of_week, review_offsets, grace_blocks, review_recovery,
                   review_expiry_days, slot_tolerance_days, slot_max_late_days
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user {}", user)))?;

        row.to_core()
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
