use phonedb_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown marketplace: {0}")]
    UnknownMarketplace(String),

    #[error("schedule interval must be 1..=24 hours, got {hours}")]
    InvalidInterval { hours: u32 },

    #[error("timezone offset {hours}h is out of range")]
    InvalidOffset { hours: i32 },

    #[error(transparent)]
    Db(#[from] DbError),
}
