//! Once-a-day sweep over every user.
//!
//! Each user's streak and review passes run independently; a failure is
//! logged and counted, and the sweep moves on.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use study_core::review::TransitionReport;

use crate::error::Result;
use crate::models::UserId;
use crate::repository::Store;
use crate::services::reviews::ReviewService;
use crate::services::streak::StreakService;

/// Outcome of one daily sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub day: Option<NaiveDate>,
    pub users: usize,
    pub streaks_updated: usize,
    pub streaks_broken: usize,
    pub reviews: TransitionReport,
    /// Users with at least one failed step.
    pub failed_users: Vec<UserId>,
}

impl MaintenanceReport {
    pub fn failures(&self) -> usize {
        self.failed_users.len()
    }
}

pub struct MaintenanceService<S> {
    store: Arc<S>,
    streak: StreakService<S>,
    reviews: ReviewService<S>,
}

impl<S: Store> MaintenanceService<S> {
    pub fn new(store: Arc<S>, lookback_days: u32) -> Self {
        Self {
            streak: StreakService::new(store.clone(), lookback_days),
            reviews: ReviewService::new(store.clone()),
            store,
        }
    }

    /// Reconcile streaks and review statuses of every user for `today`.
    pub async fn run_daily(&self, today: NaiveDate) -> Result<MaintenanceReport> {
        let users = self.store.list_user_ids().await?;
        let mut report = MaintenanceReport {
            day: Some(today),
            users: users.len(),
            ..MaintenanceReport::default()
        };

        tracing::info!(users = users.len(), day = %today, "Starting daily maintenance");

        for user in users {
            let mut failed = false;

            match self.streak.reconcile(user, today).await {
                Ok((summary, written)) => {
                    if written {
                        report.streaks_updated += 1;
                        if summary.is_broken() {
                            report.streaks_broken += 1;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(user_id = user, error = %err, kind = err.kind(), "Streak reconciliation failed");
                    failed = true;
                }
            }

            match self.reviews.reconcile(user, today).await {
                Ok(transitions) => report.reviews.merge(&transitions),
                Err(err) => {
                    tracing::warn!(user_id = user, error = %err, kind = err.kind(), "Review reconciliation failed");
                    failed = true;
                }
            }

            if failed {
                report.failed_users.push(user);
            }
        }

        tracing::info!(
            users = report.users,
            streaks_updated = report.streaks_updated,
            streaks_broken = report.streaks_broken,
            marked_late = report.reviews.marked_late,
            expired = report.reviews.expired,
            restored = report.reviews.restored,
            failures = report.failures(),
            "Daily maintenance finished"
        );
        Ok(report)
    }
}
