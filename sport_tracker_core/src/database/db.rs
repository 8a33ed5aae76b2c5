use std::{path::Path, str::FromStr};

use chrono::{DateTime, Utc};
use const_format::concatcp;
use sqlx::{
    Executor, Pool, Sqlite, SqlitePool, query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use super::constants::*;
use crate::{
    TrackerError,
    record::{RecordFilter, RecordSort},
    waypoint::{Position, SampleOrder, Waypoint},
};

/// Storage client for records and waypoints.
///
/// Cheap to clone; every `Record` holds its own handle. All writes are
/// single, independently committed statements except the record delete
/// cascade, which runs in one transaction.
#[derive(Clone)]
pub struct RecordDatabase {
    pool: Pool<Sqlite>,
}

/// One row of the Records table. Column mapping is fixed at compile time;
/// a schema mismatch surfaces as a column decode error, not a silent default.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RecordRow {
    pub record_id: i64,
    pub profile: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub distance: f64,
    pub average_speed: f64,
    pub comment: String,
}

impl RecordDatabase {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// In-memory database, mainly for tests. Capped at one connection since
    /// SQLite gives every `:memory:` connection its own private database.
    pub async fn connect_in_memory() -> Result<Self, TrackerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    async fn init(&self) -> Result<(), TrackerError> {
        self.pool
            .execute(concatcp!(
                "
            CREATE TABLE IF NOT EXISTS ", RECORDS_TABLE_NAME, "(",
                RECORD_ID,     " INTEGER PRIMARY KEY AUTOINCREMENT,",
                PROFILE,       " TEXT NOT NULL,",
                START_TIME,    " TIMESTAMP NOT NULL,",
                END_TIME,      " TIMESTAMP NOT NULL,",
                DISTANCE,      " REAL NOT NULL,",
                AVERAGE_SPEED, " REAL NOT NULL,",
                COMMENT,       " TEXT NOT NULL);

            CREATE TABLE IF NOT EXISTS ", WAYPOINTS_TABLE_NAME, "(",
                WAYPOINT_ID, " INTEGER PRIMARY KEY AUTOINCREMENT,",
                RECORD_ID,   " INTEGER NOT NULL,",
                LATITUDE,    " REAL NOT NULL,",
                LONGITUDE,   " REAL NOT NULL,",
                ALTITUDE,    " REAL,",
                ACCURACY,    " REAL,",
                SAMPLE_TIME, " TIMESTAMP NOT NULL,
                FOREIGN KEY(", RECORD_ID, ") REFERENCES ", RECORDS_TABLE_NAME, "(", RECORD_ID, ")
            )"
            ))
            .await?;
        Ok(())
    }

    /// Inserts a fresh record row carrying only its identity-relevant fields;
    /// the remaining columns start zeroed and are filled by the first update.
    pub async fn insert_record(
        &self,
        profile: &str,
        start_time: DateTime<Utc>,
    ) -> Result<i64, TrackerError> {
        let row = query_as::<_, (i64,)>(concatcp!(
            "INSERT INTO ", RECORDS_TABLE_NAME,
            "(", RECORD_ID, ", ", PROFILE, ", ", START_TIME, ", ", END_TIME, ", ",
                DISTANCE, ", ", AVERAGE_SPEED, ", ", COMMENT, ")
            VALUES (NULL, ?1, ?2, ?2, 0, 0, '') RETURNING ", RECORD_ID
        ))
        .bind(profile)
        .bind(start_time)
        .fetch_optional(&self.pool)
        .await?;

        let record_id = row
            .map(|row| row.0)
            .ok_or(TrackerError::Persistence {
                operation: "record insert",
                affected: 0,
            })?;

        tracing::debug!(record_id, profile, "inserted record");
        Ok(record_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_record(
        &self,
        record_id: i64,
        profile: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        distance: f64,
        average_speed: f64,
        comment: &str,
    ) -> Result<u64, TrackerError> {
        let affected = query(concatcp!(
            "UPDATE ", RECORDS_TABLE_NAME, " SET ",
                PROFILE,       " = ?1, ",
                START_TIME,    " = ?2, ",
                END_TIME,      " = ?3, ",
                DISTANCE,      " = ?4, ",
                AVERAGE_SPEED, " = ?5, ",
                COMMENT,       " = ?6
            WHERE ", RECORD_ID, " = ?7"
        ))
        .bind(profile)
        .bind(start_time)
        .bind(end_time)
        .bind(distance)
        .bind(average_speed)
        .bind(comment)
        .bind(record_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected)
    }

    /// Identity lookup. Exactly one row must match: zero rows is a missing
    /// record, more than one is an integrity fault and is reported as such.
    pub async fn query_record(&self, record_id: i64) -> Result<RecordRow, TrackerError> {
        let mut rows = query_as::<_, RecordRow>(concatcp!(
            "SELECT * FROM ", RECORDS_TABLE_NAME, " WHERE ", RECORD_ID, " = ?1"
        ))
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        match rows.len() {
            0 => Err(TrackerError::RecordNotFound(record_id)),
            1 => Ok(rows.remove(0)),
            matches => Err(TrackerError::IdentityConflict { record_id, matches }),
        }
    }

    pub async fn query_record_ids(
        &self,
        filter: &RecordFilter,
        sort: RecordSort,
    ) -> Result<Vec<i64>, TrackerError> {
        let mut sql = String::from(concatcp!(
            "SELECT ", RECORD_ID, " FROM ", RECORDS_TABLE_NAME
        ));
        if filter.profile.is_some() {
            sql.push_str(concatcp!(" WHERE ", PROFILE, " = ?1"));
        }
        sql.push_str(match sort {
            RecordSort::StartTimeAsc => concatcp!(" ORDER BY ", START_TIME, " ASC"),
            RecordSort::StartTimeDesc => concatcp!(" ORDER BY ", START_TIME, " DESC"),
        });

        let mut rows = query_as::<_, (i64,)>(&sql);
        if let Some(profile) = &filter.profile {
            rows = rows.bind(profile);
        }

        Ok(rows
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.0)
            .collect())
    }

    /// Deletes a record row and cascades to its waypoints in one transaction.
    /// Anything other than exactly one deleted record row rolls back, leaving
    /// the waypoints untouched, and reports `false`.
    pub async fn delete_record(&self, record_id: i64) -> Result<bool, TrackerError> {
        let mut tx = self.pool.begin().await?;

        // Children first: the foreign key blocks deleting a referenced record.
        let cascaded = query(concatcp!(
            "DELETE FROM ", WAYPOINTS_TABLE_NAME, " WHERE ", RECORD_ID, " = ?1"
        ))
        .bind(record_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let affected = query(concatcp!(
            "DELETE FROM ", RECORDS_TABLE_NAME, " WHERE ", RECORD_ID, " = ?1"
        ))
        .bind(record_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected != 1 {
            tx.rollback().await?;
            tracing::warn!(record_id, affected, "record delete affected != 1 rows, rolled back");
            return Ok(false);
        }

        tx.commit().await?;
        tracing::debug!(record_id, cascaded, "deleted record and its waypoints");
        Ok(true)
    }

    pub async fn insert_waypoint(
        &self,
        record_id: i64,
        position: &Position,
    ) -> Result<i64, TrackerError> {
        let row = query_as::<_, (i64,)>(concatcp!(
            "INSERT INTO ", WAYPOINTS_TABLE_NAME,
            "(", WAYPOINT_ID, ", ", RECORD_ID, ", ", LATITUDE, ", ", LONGITUDE, ", ",
                ALTITUDE, ", ", ACCURACY, ", ", SAMPLE_TIME, ")
            VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6) RETURNING ", WAYPOINT_ID
        ))
        .bind(record_id)
        .bind(position.latitude)
        .bind(position.longitude)
        .bind(position.altitude)
        .bind(position.accuracy)
        .bind(position.sample_time)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.0).ok_or(TrackerError::Persistence {
            operation: "waypoint insert",
            affected: 0,
        })
    }

    pub async fn query_waypoints(
        &self,
        record_id: i64,
        order: SampleOrder,
    ) -> Result<Vec<Waypoint>, TrackerError> {
        let sql = match order {
            SampleOrder::Ascending => concatcp!(
                "SELECT * FROM ", WAYPOINTS_TABLE_NAME, " WHERE ", RECORD_ID, " = ?1
                ORDER BY ", SAMPLE_TIME, " ASC"
            ),
            SampleOrder::Descending => concatcp!(
                "SELECT * FROM ", WAYPOINTS_TABLE_NAME, " WHERE ", RECORD_ID, " = ?1
                ORDER BY ", SAMPLE_TIME, " DESC"
            ),
        };

        Ok(query_as::<_, Waypoint>(sql)
            .bind(record_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Returns the affected-row count: 0 or 1 expected, the caller decides
    /// whether 0 is an error.
    pub async fn delete_waypoint(
        &self,
        record_id: i64,
        waypoint_id: i64,
    ) -> Result<u64, TrackerError> {
        Ok(query(concatcp!(
            "DELETE FROM ", WAYPOINTS_TABLE_NAME,
            " WHERE ", RECORD_ID, " = ?1 AND ", WAYPOINT_ID, " = ?2"
        ))
        .bind(record_id)
        .bind(waypoint_id)
        .execute(&self.pool)
        .await?
        .rows_affected())
    }

    pub async fn delete_record_waypoints(&self, record_id: i64) -> Result<u64, TrackerError> {
        Ok(query(concatcp!(
            "DELETE FROM ", WAYPOINTS_TABLE_NAME, " WHERE ", RECORD_ID, " = ?1"
        ))
        .bind(record_id)
        .execute(&self.pool)
        .await?
        .rows_affected())
    }
}
