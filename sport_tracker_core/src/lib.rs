use thiserror::Error;

pub mod database;
pub mod record;
pub mod waypoint;

pub use database::db::RecordDatabase;
pub use record::{Record, RecordFilter, RecordSort};
pub use waypoint::{Position, SampleOrder, Waypoint};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A storage write affected an unexpected number of rows.
    #[error("{operation} affected {affected} rows, expected 1")]
    Persistence {
        operation: &'static str,
        affected: u64,
    },
    #[error("record {0} not found")]
    RecordNotFound(i64),
    /// An identity lookup matched more than one row.
    #[error("record id {record_id} matched {matches} rows")]
    IdentityConflict { record_id: i64, matches: usize },
    #[error("waypoint index {index} out of bounds, {len} waypoints loaded")]
    IndexOutOfBounds { index: usize, len: usize },
}
