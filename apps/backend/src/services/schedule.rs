use std::sync::Arc;

use chrono::NaiveDate;

use study_core::schedule::{project_week, SameDayCompletions, WeekWindow, WeeklyProjection};

use crate::error::Result;
use crate::models::{SlotId, UserId};
use crate::repository::{PreferencesRepository, ScheduleRepository};

pub struct ScheduleService<S> {
    store: Arc<S>,
}

impl<S> ScheduleService<S>
where
    S: ScheduleRepository + PreferencesRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Project the user's weekly schedule onto the week containing
    /// `reference`, classifying slots against `today`.
    pub async fn weekly_projection(
        &self,
        user: UserId,
        reference: NaiveDate,
        today: NaiveDate,
    ) -> Result<WeeklyProjection> {
        let prefs = self.store.get(user).await?;
        self.store.ensure_schedule(user).await?;

        let slots = self.store.list_slots(user).await?;
        let week = WeekWindow::containing(reference, prefs.first_day_of_week)?;
        let slot_ids: Vec<SlotId> = slots.iter().map(|slot| slot.id).collect();

        let completions: SameDayCompletions = self
            .store
            .list_same_day_completions(user, &slot_ids, week.start, week.end)
            .await?
            .into_iter()
            .collect();

        let projection = project_week(
            &slots,
            prefs.first_day_of_week,
            reference,
            today,
            &completions,
            &prefs.slot_policy,
        )?;
        Ok(projection)
    }
}
