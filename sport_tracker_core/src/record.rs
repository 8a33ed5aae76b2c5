use chrono::{DateTime, Utc};
use geo::{Distance, Haversine};

use crate::{
    TrackerError,
    database::db::RecordDatabase,
    waypoint::{Position, SampleOrder, Waypoint},
};

/// Typed selection for [`Record::query`]. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordSort {
    #[default]
    StartTimeAsc,
    StartTimeDesc,
}

/// One tracking session: an ordered list of waypoints plus the metrics
/// derived from it.
///
/// The in-memory waypoint list mirrors what storage holds for this record;
/// every mutation either lands in both places or is rejected. Distance grows
/// by the great-circle leg between consecutive accepted positions, and
/// average speed is distance over elapsed session time.
///
/// One owner at a time: a `Record` is not internally synchronized. Callers
/// tracking several sessions concurrently use one `Record` per session.
pub struct Record {
    db: RecordDatabase,
    record_id: i64,
    profile: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    distance: f64,
    average_speed: f64,
    pub comment: String,
    waypoints: Vec<Waypoint>,
    last_position: Option<Position>,
}

impl Record {
    /// Fresh unpersisted record starting now. Nothing is written to storage
    /// until the first mutation.
    pub fn new(db: RecordDatabase, profile: impl Into<String>) -> Self {
        Self::with_start_time(db, profile, Utc::now())
    }

    pub fn with_start_time(
        db: RecordDatabase,
        profile: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            db,
            record_id: 0,
            profile: profile.into(),
            start_time,
            end_time: start_time,
            distance: 0.0,
            average_speed: 0.0,
            comment: String::new(),
            waypoints: Vec::new(),
            last_position: None,
        }
    }

    /// 0 until the record was first persisted.
    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Accumulated great-circle distance in meters.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Meters per second, 0.0 while no session time has elapsed.
    pub fn average_speed(&self) -> f64 {
        self.average_speed
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    /// Waypoints indexed in chronological insertion order.
    pub fn get_waypoint(&self, index: usize) -> Result<&Waypoint, TrackerError> {
        self.waypoints.get(index).ok_or(TrackerError::IndexOutOfBounds {
            index,
            len: self.waypoints.len(),
        })
    }

    /// Accepts one position sample: persists it as a waypoint, appends it to
    /// the in-memory list, advances `end_time` to the sample's fix time and
    /// folds the leg from the previous position into distance and average
    /// speed, then upserts the record metadata.
    ///
    /// A failed waypoint insert leaves the record completely unchanged. The
    /// waypoint insert and the metadata upsert are two independently
    /// committed writes; if the upsert fails the waypoint already exists in
    /// storage and stays in the in-memory list, so the upsert is retried once
    /// before the error is reported. Until the next successful save the
    /// stored metadata then lags behind the stored waypoints.
    pub async fn add_waypoint(&mut self, position: Position) -> Result<(), TrackerError> {
        // Assign an identity first so the waypoint row carries a real key.
        if self.record_id == 0 {
            self.save().await?;
        }

        let waypoint_id = self.db.insert_waypoint(self.record_id, &position).await?;

        self.waypoints.push(Waypoint {
            waypoint_id,
            record_id: self.record_id,
            position: position.clone(),
        });

        self.end_time = position.sample_time;
        if let Some(last) = &self.last_position {
            self.distance += Haversine.distance(last.point(), position.point());
        }
        self.average_speed = average_speed(self.distance, self.start_time, self.end_time);
        self.last_position = Some(position);

        if let Err(error) = self.save().await {
            tracing::warn!(
                record_id = self.record_id,
                %error,
                "metadata upsert failed after waypoint insert, retrying"
            );
            self.save().await?;
        }
        Ok(())
    }

    /// Deletes the waypoint at `index` from storage and, only once storage
    /// confirms a single-row delete, from the in-memory list. Distance and
    /// average speed keep their values: removing a historical sample does not
    /// rewrite the metrics that were derived while it was part of the track.
    pub async fn delete_waypoint(&mut self, index: usize) -> Result<(), TrackerError> {
        let (record_id, waypoint_id) = {
            let waypoint = self.get_waypoint(index)?;
            (waypoint.record_id, waypoint.waypoint_id)
        };

        let affected = self.db.delete_waypoint(record_id, waypoint_id).await?;
        if affected != 1 {
            return Err(TrackerError::Persistence {
                operation: "waypoint delete",
                affected,
            });
        }

        self.waypoints.remove(index);
        Ok(())
    }

    /// Upserts the record metadata: inserts first when the record has no
    /// identity yet, then updates the full row. Returns the affected row
    /// count of the update, which is 1 on success.
    pub async fn save(&mut self) -> Result<u64, TrackerError> {
        if self.record_id == 0 {
            self.record_id = self.db.insert_record(&self.profile, self.start_time).await?;
        }

        let affected = self
            .db
            .update_record(
                self.record_id,
                &self.profile,
                self.start_time,
                self.end_time,
                self.distance,
                self.average_speed,
                &self.comment,
            )
            .await?;

        if affected == 0 {
            return Err(TrackerError::Persistence {
                operation: "record update",
                affected,
            });
        }
        Ok(affected)
    }

    /// Materializes a stored record: exactly one row must match `record_id`,
    /// then all its waypoints are loaded ordered by sample time ascending.
    /// The previous position is re-seeded from the last waypoint so further
    /// samples continue the distance accumulation.
    pub async fn load(db: &RecordDatabase, record_id: i64) -> Result<Record, TrackerError> {
        let row = db.query_record(record_id).await?;
        let waypoints = db.query_waypoints(record_id, SampleOrder::Ascending).await?;
        let last_position = waypoints.last().map(|waypoint| waypoint.position.clone());

        Ok(Record {
            db: db.clone(),
            record_id: row.record_id,
            profile: row.profile,
            start_time: row.start_time,
            end_time: row.end_time,
            distance: row.distance,
            average_speed: row.average_speed,
            comment: row.comment,
            waypoints,
            last_position,
        })
    }

    /// Fetches all records matching `filter`, ordered per `sort`. Each match
    /// is materialized through [`Record::load`], one query pair per record,
    /// the same shape the history view reads with.
    pub async fn query(
        db: &RecordDatabase,
        filter: &RecordFilter,
        sort: RecordSort,
    ) -> Result<Vec<Record>, TrackerError> {
        let ids = db.query_record_ids(filter, sort).await?;

        let mut records = Vec::with_capacity(ids.len());
        for record_id in ids {
            records.push(Record::load(db, record_id).await?);
        }
        Ok(records)
    }

    /// Deletes a stored record and all its waypoints. The cascade only
    /// happens when exactly one record row was deleted; otherwise storage is
    /// left untouched and `false` is returned.
    pub async fn delete(db: &RecordDatabase, record_id: i64) -> Result<bool, TrackerError> {
        db.delete_record(record_id).await
    }
}

fn average_speed(distance: f64, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let elapsed = (end - start).num_milliseconds() as f64 / 1000.0;
    if elapsed > 0.0 { distance / elapsed } else { 0.0 }
}
