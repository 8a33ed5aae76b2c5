use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};

/// One geodetic sample as delivered by the position source.
///
/// `sample_time` is the fix timestamp reported by the receiver, not the time
/// the sample reached us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub sample_time: DateTime<Utc>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, sample_time: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            sample_time,
        }
    }

    /// (x, y) = (longitude, latitude)
    pub fn point(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }
}

/// A persisted position sample belonging to one record.
///
/// Written once on insert, never updated; deleted individually or when the
/// owning record is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Waypoint {
    pub waypoint_id: i64,
    pub record_id: i64,
    #[sqlx(flatten)]
    pub position: Position,
}

/// Sort order for waypoint queries. Chronological order is the canonical one
/// for distance computation and history display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SampleOrder {
    #[default]
    Ascending,
    Descending,
}
