//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - MemoryStore, an in-memory implementation of every repository trait
//! - TestContext wiring the services over a fresh store
//! - Helpers for seeding users, subjects and schedule slots

#![allow(dead_code)]

pub mod fixtures;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};

use study_core::review::{self, BulkTransition, ReviewFilter, ReviewPlan};
use studyhelper_backend::error::{Result, ServiceError};
use studyhelper_backend::models::{
    NewReviewItem, NewStudyRecord, RecordCascade, RecordId, ReviewId, ReviewItem, ReviewStatus,
    ScheduleSlot, SlotId, StreakState, StudyRecord, SubjectId, UserId, UserPreferences,
};
use studyhelper_backend::repository::{
    ActivityRepository, PreferencesRepository, RecordRepository, ReviewRepository,
    ScheduleRepository, StreakRepository,
};
use studyhelper_backend::services::Services;

#[derive(Debug, Clone)]
struct UserRow {
    prefs: UserPreferences,
    streak: StreakState,
}

#[derive(Clone, Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<UserId, UserRow>,
    subjects: BTreeMap<SubjectId, UserId>,
    schedules: BTreeMap<UserId, i64>,
    slots: BTreeMap<SlotId, ScheduleSlot>,
    records: BTreeMap<RecordId, StudyRecord>,
    reviews: BTreeMap<ReviewId, ReviewItem>,
    failing_users: HashSet<UserId>,
    fail_review_writes: bool,
    fail_record_deletes: bool,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_user(&self, user: UserId) -> Result<&UserRow> {
        if self.failing_users.contains(&user) {
            return Err(ServiceError::Internal(format!("storage unavailable for user {}", user)));
        }
        self.users
            .get(&user)
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user)))
    }

    fn insert_record(&mut self, record: &NewStudyRecord) -> StudyRecord {
        let id = self.next_id();
        let stored = StudyRecord {
            id,
            owner_id: record.owner_id,
            kind: record.kind,
            studied_on: record.studied_on,
            minutes: record.minutes,
            notes: record.notes.clone(),
            subject_id: record.subject_id,
            slot_id: record.slot_id,
        };
        self.records.insert(id, stored.clone());
        stored
    }

    fn insert_reviews(&mut self, items: &[NewReviewItem]) -> Result<Vec<ReviewItem>> {
        let mut created = Vec::with_capacity(items.len());
        for item in items {
            if self.fail_review_writes {
                return Err(ServiceError::Internal("review write failed".to_string()));
            }
            let id = self.next_id();
            let stored = ReviewItem {
                id,
                owner_id: item.owner_id,
                scheduled_date: item.scheduled_date,
                status: ReviewStatus::Pending,
                origin_record_id: item.origin_record_id,
                completion_record_id: None,
                slot_id: item.slot_id,
            };
            self.reviews.insert(id, stored.clone());
            created.push(stored);
        }
        Ok(created)
    }

    fn mark_done(&mut self, user: UserId, id: ReviewId, completion: RecordId) -> Result<bool> {
        if self.fail_review_writes {
            return Err(ServiceError::Internal("review write failed".to_string()));
        }
        if self
            .reviews
            .values()
            .any(|item| item.completion_record_id == Some(completion))
        {
            return Err(ServiceError::Conflict(format!(
                "record {} already completes another review",
                completion
            )));
        }
        match self.reviews.get_mut(&id) {
            Some(item) if item.owner_id == user && !item.status.is_terminal() => {
                item.status = ReviewStatus::Done;
                item.completion_record_id = Some(completion);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn reopen_completed_by(&mut self, user: UserId, record: RecordId) -> Option<ReviewId> {
        let item = self
            .reviews
            .values_mut()
            .find(|item| item.owner_id == user && item.completion_record_id == Some(record))?;
        *item = review::reopen(item);
        Some(item.id)
    }

    fn delete_by_origin(&mut self, user: UserId, origin: RecordId) -> u64 {
        let before = self.reviews.len();
        self.reviews
            .retain(|_, item| !(item.owner_id == user && item.origin_record_id == origin));
        (before - self.reviews.len()) as u64
    }

    fn delete_record(&mut self, user: UserId, id: RecordId) -> Result<bool> {
        if self.fail_record_deletes {
            return Err(ServiceError::Internal("record delete failed".to_string()));
        }
        if !self.records.get(&id).is_some_and(|r| r.owner_id == user) {
            return Ok(false);
        }
        if self.reviews.values().any(|item| item.completion_record_id == Some(id)) {
            return Err(ServiceError::Internal(format!(
                "record {} still completes a review",
                id
            )));
        }
        self.records.remove(&id);
        Ok(true)
    }
}

/// In-memory store with the same matching rules as the Postgres queries.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` on a copy of the store and keep the copy only on success,
    /// like a database transaction.
    fn transaction<T>(&self, apply: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.lock().unwrap();
        let mut staged = inner.clone();
        let value = apply(&mut staged)?;
        *inner = staged;
        Ok(value)
    }

    pub fn add_user(&self, prefs: UserPreferences) -> UserId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let streak = StreakState::empty(prefs.grace.budget());
        inner.users.insert(id, UserRow { prefs, streak });
        id
    }

    pub fn add_subject(&self, user: UserId) -> SubjectId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.subjects.insert(id, user);
        id
    }

    pub fn add_slot(
        &self,
        user: UserId,
        weekday: Weekday,
        position: i32,
        subject: SubjectId,
        created_on: NaiveDate,
    ) -> SlotId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        inner.slots.insert(
            id,
            ScheduleSlot {
                id,
                owner_id: user,
                weekday,
                position,
                subject_id: subject,
                created_on,
            },
        );
        id
    }

    pub fn set_streak(&self, user: UserId, state: StreakState) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.users.get_mut(&user) {
            row.streak = state;
        }
    }

    pub fn streak(&self, user: UserId) -> StreakState {
        self.inner.lock().unwrap().users[&user].streak.clone()
    }

    pub fn review(&self, id: ReviewId) -> Option<ReviewItem> {
        self.inner.lock().unwrap().reviews.get(&id).cloned()
    }

    pub fn put_review(&self, item: ReviewItem) {
        self.inner.lock().unwrap().reviews.insert(item.id, item);
    }

    pub fn reviews_of(&self, user: UserId) -> Vec<ReviewItem> {
        self.inner
            .lock()
            .unwrap()
            .reviews
            .values()
            .filter(|item| item.owner_id == user)
            .cloned()
            .collect()
    }

    pub fn records_of(&self, user: UserId) -> Vec<StudyRecord> {
        self.inner
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|record| record.owner_id == user)
            .cloned()
            .collect()
    }

    pub fn schedule_count(&self) -> usize {
        self.inner.lock().unwrap().schedules.len()
    }

    pub fn set_preferences(&self, user: UserId, prefs: UserPreferences) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.users.get_mut(&user) {
            row.prefs = prefs;
        }
    }

    /// Make every streak and preference read for `user` fail.
    pub fn fail_user(&self, user: UserId) {
        self.inner.lock().unwrap().failing_users.insert(user);
    }

    /// Make review inserts and completions fail after earlier writes of the
    /// same transaction went through.
    pub fn fail_review_writes(&self) {
        self.inner.lock().unwrap().fail_review_writes = true;
    }

    /// Make record deletes fail after the review rows were already touched.
    pub fn fail_record_deletes(&self) {
        self.inner.lock().unwrap().fail_record_deletes = true;
    }
}

#[async_trait]
impl ActivityRepository for MemoryStore {
    async fn list_distinct_days(&self, user: UserId, since: NaiveDate) -> Result<Vec<NaiveDate>> {
        let inner = self.inner.lock().unwrap();
        let mut days: Vec<NaiveDate> = inner
            .records
            .values()
            .filter(|r| r.owner_id == user && r.studied_on >= since)
            .map(|r| r.studied_on)
            .collect();
        days.sort();
        days.dedup();
        Ok(days)
    }

    async fn list_review_completion_days(
        &self,
        user: UserId,
        since: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let inner = self.inner.lock().unwrap();
        let mut days: Vec<NaiveDate> = inner
            .reviews
            .values()
            .filter_map(|item| item.completion_record_id)
            .filter_map(|id| inner.records.get(&id))
            .filter(|r| r.owner_id == user && r.studied_on >= since)
            .map(|r| r.studied_on)
            .collect();
        days.sort();
        Ok(days)
    }
}

#[async_trait]
impl RecordRepository for MemoryStore {
    async fn insert_record(&self, record: &NewStudyRecord) -> Result<StudyRecord> {
        self.transaction(|inner| Ok(inner.insert_record(record)))
    }

    async fn insert_record_with_reviews(
        &self,
        record: &NewStudyRecord,
        plan: &ReviewPlan,
    ) -> Result<(StudyRecord, Vec<ReviewItem>)> {
        self.transaction(|inner| {
            let inserted = inner.insert_record(record);
            let planned = review::plan_reviews(&inserted, plan)?;
            let created = inner.insert_reviews(&planned)?;
            Ok((inserted, created))
        })
    }

    async fn insert_completion(
        &self,
        record: &NewStudyRecord,
        review: ReviewId,
    ) -> Result<StudyRecord> {
        self.transaction(|inner| {
            let inserted = inner.insert_record(record);
            if !inner.mark_done(record.owner_id, review, inserted.id)? {
                return Err(ServiceError::Conflict(format!(
                    "review {} was completed concurrently",
                    review
                )));
            }
            Ok(inserted)
        })
    }

    async fn find_record(&self, user: UserId, id: RecordId) -> Result<Option<StudyRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.records.get(&id).filter(|r| r.owner_id == user).cloned())
    }

    async fn delete_record_cascade(
        &self,
        user: UserId,
        id: RecordId,
    ) -> Result<Option<RecordCascade>> {
        self.transaction(|inner| {
            let reopened_review = inner.reopen_completed_by(user, id);
            let removed_reviews = inner.delete_by_origin(user, id);
            if !inner.delete_record(user, id)? {
                return Ok(None);
            }
            Ok(Some(RecordCascade {
                reopened_review,
                removed_reviews,
            }))
        })
    }

    async fn subject_owned(&self, user: UserId, subject: SubjectId) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.subjects.get(&subject) == Some(&user))
    }
}

#[async_trait]
impl StreakRepository for MemoryStore {
    async fn read(&self, user: UserId) -> Result<StreakState> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.check_user(user)?.streak.clone())
    }

    async fn write(&self, user: UserId, state: &StreakState) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .users
            .get_mut(&user)
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user)))?;
        row.streak = state.clone();
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn create(&self, items: &[NewReviewItem]) -> Result<Vec<ReviewItem>> {
        self.transaction(|inner| inner.insert_reviews(items))
    }

    async fn find_owned(&self, user: UserId, id: ReviewId) -> Result<Option<ReviewItem>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.reviews.get(&id).filter(|item| item.owner_id == user).cloned())
    }

    async fn snooze(
        &self,
        user: UserId,
        id: ReviewId,
        new_date: NaiveDate,
    ) -> Result<Option<ReviewItem>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.reviews.get_mut(&id) {
            Some(item) if item.owner_id == user && item.status != ReviewStatus::Done => {
                item.scheduled_date = new_date;
                item.status = ReviewStatus::Snoozed;
                Ok(Some(item.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn bulk_transition(&self, user: UserId, transition: &BulkTransition) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_user(user)?;
        let mut affected = 0;
        for item in inner.reviews.values_mut() {
            if item.owner_id == user && transition.applies_to(item) {
                item.status = transition.to;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn list(&self, user: UserId, filter: &ReviewFilter) -> Result<Vec<ReviewItem>> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<ReviewItem> = inner
            .reviews
            .values()
            .filter(|item| item.owner_id == user && filter.matches(item))
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.scheduled_date, item.id));
        Ok(items)
    }
}

#[async_trait]
impl ScheduleRepository for MemoryStore {
    async fn ensure_schedule(&self, user: UserId) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(id) = inner.schedules.get(&user) {
            return Ok(*id);
        }
        let id = inner.next_id();
        inner.schedules.insert(user, id);
        Ok(id)
    }

    async fn list_slots(&self, user: UserId) -> Result<Vec<ScheduleSlot>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .slots
            .values()
            .filter(|slot| slot.owner_id == user)
            .cloned()
            .collect())
    }

    async fn find_slot(&self, user: UserId, slot: SlotId) -> Result<Option<ScheduleSlot>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.slots.get(&slot).filter(|s| s.owner_id == user).cloned())
    }

    async fn list_same_day_completions(
        &self,
        user: UserId,
        slots: &[SlotId],
        week_start: NaiveDate,
        week_end: NaiveDate,
    ) -> Result<Vec<(SlotId, NaiveDate)>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .values()
            .filter(|r| {
                r.owner_id == user
                    && r.kind == studyhelper_backend::models::RecordKind::SubjectStudy
                    && r.studied_on >= week_start
                    && r.studied_on < week_end
            })
            .filter_map(|r| r.slot_id.filter(|slot| slots.contains(slot)).map(|slot| (slot, r.studied_on)))
            .collect())
    }
}

#[async_trait]
impl PreferencesRepository for MemoryStore {
    async fn get(&self, user: UserId) -> Result<UserPreferences> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.check_user(user)?.prefs.clone())
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.keys().copied().collect())
    }
}

/// Test context with services wired over a fresh in-memory store.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub services: Services<MemoryStore>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let services = Services::new(store.clone(), study_core::streak::LOOKBACK_DAYS);
        Self { store, services }
    }

    /// A user with default preferences.
    pub fn user(&self) -> UserId {
        self.store.add_user(UserPreferences::default())
    }

    /// A user with a subject assigned to a slot on `weekday`.
    pub fn user_with_slot(&self, weekday: Weekday, created_on: NaiveDate) -> (UserId, SubjectId, SlotId) {
        let user = self.user();
        let subject = self.store.add_subject(user);
        let slot = self.store.add_slot(user, weekday, 0, subject, created_on);
        (user, subject, slot)
    }
}
