pub mod maintenance;
pub mod records;
pub mod reviews;
pub mod schedule;
pub mod streak;

use std::sync::Arc;

use crate::repository::Store;

pub use maintenance::{MaintenanceReport, MaintenanceService};
pub use records::RecordService;
pub use reviews::ReviewService;
pub use schedule::ScheduleService;
pub use streak::StreakService;

/// All services over one shared store.
pub struct Services<S> {
    pub records: RecordService<S>,
    pub reviews: ReviewService<S>,
    pub streak: StreakService<S>,
    pub schedule: ScheduleService<S>,
    pub maintenance: MaintenanceService<S>,
}

impl<S: Store> Services<S> {
    pub fn new(store: Arc<S>, lookback_days: u32) -> Self {
        Self {
            records: RecordService::new(store.clone(), lookback_days),
            reviews: ReviewService::new(store.clone()),
            streak: StreakService::new(store.clone(), lookback_days),
            schedule: ScheduleService::new(store.clone()),
            maintenance: MaintenanceService::new(store, lookback_days),
        }
    }
}
