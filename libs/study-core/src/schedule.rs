//! Projection of the recurring weekly schedule onto a concrete week.

use std::collections::HashSet;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{add_days, diff_in_days, end_of_week, offset_from_first_day, start_of_week};
use crate::error::Result;
use crate::types::{ScheduleSlot, SlotId, SlotPolicy, SlotStatus, SubjectId};

/// Half-open week `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekWindow {
    pub first_day: Weekday,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    /// The week containing `reference`.
    pub fn containing(reference: NaiveDate, first_day: Weekday) -> Result<Self> {
        let start = start_of_week(reference, first_day)?;
        Ok(Self {
            first_day,
            start,
            end: end_of_week(start)?,
        })
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day < self.end
    }

    /// Date of `weekday` inside this week.
    pub fn date_of(&self, weekday: Weekday) -> Result<NaiveDate> {
        add_days(self.start, offset_from_first_day(self.first_day, weekday))
    }
}

/// Slots completed by a study record on a given day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SameDayCompletions {
    entries: HashSet<(SlotId, NaiveDate)>,
}

impl SameDayCompletions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot_id: SlotId, day: NaiveDate) {
        self.entries.insert((slot_id, day));
    }

    pub fn contains(&self, slot_id: SlotId, day: NaiveDate) -> bool {
        self.entries.contains(&(slot_id, day))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(SlotId, NaiveDate)> for SameDayCompletions {
    fn from_iter<I: IntoIterator<Item = (SlotId, NaiveDate)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// One slot placed on a concrete day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedSlot {
    pub slot_id: SlotId,
    pub subject_id: SubjectId,
    pub weekday: Weekday,
    pub position: i32,
    pub target_date: NaiveDate,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyProjection {
    pub week: WeekWindow,
    pub slots: Vec<ProjectedSlot>,
}

impl WeeklyProjection {
    pub fn count(&self, status: SlotStatus) -> usize {
        self.slots.iter().filter(|slot| slot.status == status).count()
    }
}

/// Place `slot` inside `week`, or `None` when it did not exist yet that week.
pub fn target_date(slot: &ScheduleSlot, week: &WeekWindow) -> Result<Option<NaiveDate>> {
    if slot.created_on >= week.end {
        return Ok(None);
    }
    Ok(Some(week.date_of(slot.weekday)?.max(slot.created_on)))
}

/// Classify a placed slot relative to `today`.
pub fn classify(
    slot_id: SlotId,
    target: NaiveDate,
    today: NaiveDate,
    completions: &SameDayCompletions,
    policy: &SlotPolicy,
) -> SlotStatus {
    if completions.contains(slot_id, target) {
        return SlotStatus::Completed;
    }

    let days_after_due = diff_in_days(today, target) - i64::from(policy.tolerance_days);
    if days_after_due > 0 && days_after_due <= i64::from(policy.max_late_days) {
        SlotStatus::Late
    } else {
        SlotStatus::Pending
    }
}

/// Project `slots` onto the week containing `reference`.
pub fn project_week(
    slots: &[ScheduleSlot],
    first_day: Weekday,
    reference: NaiveDate,
    today: NaiveDate,
    completions: &SameDayCompletions,
    policy: &SlotPolicy,
) -> Result<WeeklyProjection> {
    let week = WeekWindow::containing(reference, first_day)?;

    let mut ordered: Vec<&ScheduleSlot> = slots.iter().collect();
    ordered.sort_by_key(|slot| {
        (
            offset_from_first_day(first_day, slot.weekday),
            slot.position,
            slot.id,
        )
    });

    let mut projected = Vec::with_capacity(ordered.len());
    for slot in ordered {
        let Some(target) = target_date(slot, &week)? else {
            continue;
        };
        projected.push(ProjectedSlot {
            slot_id: slot.id,
            subject_id: slot.subject_id,
            weekday: slot.weekday,
            position: slot.position,
            target_date: target,
            status: classify(slot.id, target, today, completions, policy),
        });
    }

    Ok(WeeklyProjection {
        week,
        slots: projected,
    })
}
