//! Streak write-back.
//!
//! Record changes trigger a full recompute over the look-back window; the
//! daily sweep advances the stored state incrementally. A stored state charged
//! against a different grace budget than the user's current one is rebuilt
//! from history instead.

use std::sync::Arc;

use chrono::NaiveDate;

use study_core::calendar::lookback_start;
use study_core::streak::{self, collect_activity, StreakSummary};

use crate::error::Result;
use crate::models::{StreakState, UserId, UserPreferences};
use crate::repository::{ActivityRepository, PreferencesRepository, StreakRepository};

pub struct StreakService<S> {
    store: Arc<S>,
    lookback_days: u32,
}

impl<S> StreakService<S>
where
    S: ActivityRepository + StreakRepository + PreferencesRepository,
{
    pub fn new(store: Arc<S>, lookback_days: u32) -> Self {
        Self {
            store,
            lookback_days,
        }
    }

    /// Rebuild the streak from history and persist it.
    pub async fn recompute(&self, user: UserId, today: NaiveDate) -> Result<StreakSummary> {
        let prefs = self.store.get(user).await?;
        let summary = self.rebuild(user, &prefs, today).await?;
        self.store.write(user, &summary.to_state()).await?;

        tracing::debug!(
            user_id = user,
            current = summary.current,
            blocks_used = summary.blocks_used,
            "Recomputed streak"
        );
        Ok(summary)
    }

    /// Advance the stored streak to `today`. Writes only when it changed.
    ///
    /// Returns the summary and whether it was persisted.
    pub async fn reconcile(&self, user: UserId, today: NaiveDate) -> Result<(StreakSummary, bool)> {
        let prefs = self.store.get(user).await?;
        let state = self.store.read(user).await?;
        let summary = self.advance(user, &prefs, &state, today).await?;

        if !summary.differs_from(&state) {
            return Ok((summary, false));
        }

        self.store.write(user, &summary.to_state()).await?;
        if summary.is_broken() {
            tracing::info!(
                user_id = user,
                previous = state.current,
                "Streak broken: grace blocks exhausted"
            );
        }
        Ok((summary, true))
    }

    /// Streak as it stands on `today`, without persisting anything.
    pub async fn current(&self, user: UserId, today: NaiveDate) -> Result<StreakSummary> {
        let prefs = self.store.get(user).await?;
        let state = self.store.read(user).await?;
        self.advance(user, &prefs, &state, today).await
    }

    async fn advance(
        &self,
        user: UserId,
        prefs: &UserPreferences,
        state: &StreakState,
        today: NaiveDate,
    ) -> Result<StreakSummary> {
        let budget = prefs.grace.budget();
        if state.blocks_total == budget {
            return Ok(streak::reconcile(state, today));
        }

        tracing::debug!(
            user_id = user,
            stored = state.blocks_total,
            budget,
            "Grace budget changed, rebuilding streak"
        );
        self.rebuild(user, prefs, today).await
    }

    async fn rebuild(
        &self,
        user: UserId,
        prefs: &UserPreferences,
        today: NaiveDate,
    ) -> Result<StreakSummary> {
        let since = lookback_start(today, self.lookback_days)?;

        let study_days = self.store.list_distinct_days(user, since).await?;
        let completion_days = if prefs.grace.review_recovery {
            self.store.list_review_completion_days(user, since).await?
        } else {
            Vec::new()
        };

        let activity = collect_activity(&study_days, &completion_days);
        Ok(streak::recompute(&activity, prefs.grace.budget(), today))
    }
}
