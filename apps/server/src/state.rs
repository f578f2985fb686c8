use std::time::Instant;

use crate::config::AppConfig;
use crate::scheduling::ScheduleConfig;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: AppConfig,
    pub schedule: ScheduleConfig,
    pub started_at: Instant,
}
