//! Test fixtures and factory functions for creating test data.

use chrono::NaiveDate;

use studyhelper_backend::models::{RecordKind, RecordRequest, ReviewId, SlotId, SubjectId};

/// Day in January 2026. 2026-01-05 is a Monday.
pub fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
}

fn request(kind: RecordKind, on: NaiveDate) -> RecordRequest {
    RecordRequest {
        kind,
        studied_on: on.format("%Y-%m-%d").to_string(),
        minutes: 30,
        notes: None,
        subject_id: None,
        slot_id: None,
        review_id: None,
    }
}

/// Subject study linked to a schedule slot.
pub fn subject_study(subject: SubjectId, slot: SlotId, on: NaiveDate) -> RecordRequest {
    RecordRequest {
        subject_id: Some(subject),
        slot_id: Some(slot),
        ..request(RecordKind::SubjectStudy, on)
    }
}

/// Completion of a scheduled review.
pub fn review_record(review: ReviewId, on: NaiveDate) -> RecordRequest {
    RecordRequest {
        review_id: Some(review),
        ..request(RecordKind::Review, on)
    }
}

/// Free study outside the plan.
pub fn open_study(on: NaiveDate) -> RecordRequest {
    request(RecordKind::OpenStudy, on)
}
