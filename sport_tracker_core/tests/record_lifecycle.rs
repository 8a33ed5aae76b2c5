//! End-to-end session lifecycle: feed samples, check derived metrics,
//! round-trip through storage, delete waypoints and whole records.

use chrono::{DateTime, Utc};
use sport_tracker_core::{
    Position, Record, RecordDatabase, RecordFilter, RecordSort, TrackerError,
};

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn sample(latitude: f64, longitude: f64, secs: i64) -> Position {
    Position::new(latitude, longitude, ts(secs))
}

async fn db() -> RecordDatabase {
    RecordDatabase::connect_in_memory().await.unwrap()
}

#[tokio::test]
async fn cycling_scenario_distance_and_speed() {
    let db = db().await;
    let mut record = Record::with_start_time(db, "cycling", ts(1000));

    // First sample is the baseline: no distance yet, elapsed time 0.
    record.add_waypoint(sample(0.0, 0.0, 1000)).await.unwrap();
    assert_eq!(record.waypoint_count(), 1);
    assert_eq!(record.distance(), 0.0);
    assert_eq!(record.average_speed(), 0.0);

    // 0.001 deg of longitude on the equator is roughly 111 m east.
    record.add_waypoint(sample(0.0, 0.001, 1100)).await.unwrap();
    assert_eq!(record.waypoint_count(), 2);
    assert_eq!(record.end_time(), ts(1100));
    assert!((record.distance() - 111.2).abs() < 1.0, "distance {}", record.distance());
    assert!(
        (record.average_speed() - 1.112).abs() < 0.05,
        "average speed {}",
        record.average_speed()
    );
}

#[tokio::test]
async fn waypoints_kept_in_insertion_order() {
    let db = db().await;
    let mut record = Record::with_start_time(db, "walking", ts(0));

    let samples: Vec<_> = (0..5).map(|i| sample(50.0 + i as f64 * 0.001, 8.0, 10 + i)).collect();
    for position in &samples {
        record.add_waypoint(position.clone()).await.unwrap();
    }

    assert_eq!(record.waypoint_count(), samples.len());
    for (i, position) in samples.iter().enumerate() {
        assert_eq!(&record.get_waypoint(i).unwrap().position, position);
    }
}

#[tokio::test]
async fn distance_is_sum_of_consecutive_legs() {
    let db = db().await;
    let mut record = Record::with_start_time(db, "walking", ts(0));

    // Two equal legs along the equator must accumulate, not restart.
    record.add_waypoint(sample(0.0, 0.0, 0)).await.unwrap();
    record.add_waypoint(sample(0.0, 0.001, 100)).await.unwrap();
    let one_leg = record.distance();
    record.add_waypoint(sample(0.0, 0.002, 200)).await.unwrap();

    assert!((record.distance() - 2.0 * one_leg).abs() < 1e-6);
}

#[tokio::test]
async fn save_load_roundtrip() {
    let db = db().await;
    let mut record = Record::with_start_time(db.clone(), "cycling", ts(1000));
    record.comment = "to the lake and back".to_string();

    record.add_waypoint(sample(47.0, 11.0, 1000)).await.unwrap();
    record.add_waypoint(sample(47.001, 11.0, 1060)).await.unwrap();
    record.add_waypoint(sample(47.002, 11.001, 1120)).await.unwrap();
    record.save().await.unwrap();

    let loaded = Record::load(&db, record.record_id()).await.unwrap();
    assert_eq!(loaded.record_id(), record.record_id());
    assert_eq!(loaded.profile(), "cycling");
    assert_eq!(loaded.start_time(), ts(1000));
    assert_eq!(loaded.end_time(), ts(1120));
    assert_eq!(loaded.distance(), record.distance());
    assert_eq!(loaded.average_speed(), record.average_speed());
    assert_eq!(loaded.comment, "to the lake and back");

    assert_eq!(loaded.waypoint_count(), 3);
    for i in 0..3 {
        assert_eq!(
            loaded.get_waypoint(i).unwrap(),
            record.get_waypoint(i).unwrap()
        );
    }
}

#[tokio::test]
async fn loaded_record_continues_distance_accumulation() {
    let db = db().await;
    let mut record = Record::with_start_time(db.clone(), "walking", ts(0));
    record.add_waypoint(sample(0.0, 0.0, 0)).await.unwrap();
    record.add_waypoint(sample(0.0, 0.001, 100)).await.unwrap();
    let before = record.distance();

    // The next sample after a reload continues from the last stored position.
    let mut loaded = Record::load(&db, record.record_id()).await.unwrap();
    loaded.add_waypoint(sample(0.0, 0.002, 200)).await.unwrap();

    assert!((loaded.distance() - 2.0 * before).abs() < 1e-6);
    assert_eq!(loaded.waypoint_count(), 3);
}

#[tokio::test]
async fn delete_waypoint_keeps_order_and_aggregates() {
    let db = db().await;
    let mut record = Record::with_start_time(db.clone(), "walking", ts(0));

    for i in 0..4 {
        record.add_waypoint(sample(50.0 + i as f64 * 0.001, 8.0, 10 + i)).await.unwrap();
    }
    let distance = record.distance();
    let average_speed = record.average_speed();
    let second = record.get_waypoint(1).unwrap().clone();

    record.delete_waypoint(1).await.unwrap();

    assert_eq!(record.waypoint_count(), 3);
    let remaining: Vec<_> = (0..3)
        .map(|i| record.get_waypoint(i).unwrap().position.sample_time)
        .collect();
    assert_eq!(remaining, vec![ts(10), ts(12), ts(13)]);

    // Metrics derived while the sample was part of the track are kept.
    assert_eq!(record.distance(), distance);
    assert_eq!(record.average_speed(), average_speed);

    // Gone from storage too.
    let loaded = Record::load(&db, record.record_id()).await.unwrap();
    assert_eq!(loaded.waypoint_count(), 3);
    assert!(
        !(0..loaded.waypoint_count())
            .any(|i| loaded.get_waypoint(i).unwrap().waypoint_id == second.waypoint_id)
    );
}

#[tokio::test]
async fn failed_storage_delete_leaves_memory_unchanged() {
    let db = db().await;
    let mut record = Record::with_start_time(db.clone(), "walking", ts(0));
    record.add_waypoint(sample(50.0, 8.0, 10)).await.unwrap();

    // Pull the row out from under the record, then ask it to delete: storage
    // reports 0 affected rows, so the in-memory entry must survive.
    let waypoint_id = record.get_waypoint(0).unwrap().waypoint_id;
    db.delete_waypoint(record.record_id(), waypoint_id).await.unwrap();

    let result = record.delete_waypoint(0).await;
    assert!(matches!(
        result,
        Err(TrackerError::Persistence {
            operation: "waypoint delete",
            affected: 0,
        })
    ));
    assert_eq!(record.waypoint_count(), 1);
}

#[tokio::test]
async fn load_missing_record_fails() {
    let db = db().await;

    let result = Record::load(&db, 4711).await;
    assert!(matches!(result, Err(TrackerError::RecordNotFound(4711))));
}

#[tokio::test]
async fn query_filters_by_profile_and_sorts() {
    let db = db().await;

    for (profile, start) in [("cycling", 100), ("walking", 200), ("cycling", 300)] {
        let mut record = Record::with_start_time(db.clone(), profile, ts(start));
        record.save().await.unwrap();
    }

    let cycling = Record::query(
        &db,
        &RecordFilter {
            profile: Some("cycling".to_string()),
        },
        RecordSort::StartTimeDesc,
    )
    .await
    .unwrap();

    assert_eq!(cycling.len(), 2);
    assert_eq!(cycling[0].start_time(), ts(300));
    assert_eq!(cycling[1].start_time(), ts(100));

    let all = Record::query(&db, &RecordFilter::default(), RecordSort::StartTimeAsc)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].start_time(), ts(100));
    assert_eq!(all[2].start_time(), ts(300));
}

#[tokio::test]
async fn delete_record_cascades_waypoints() {
    let db = db().await;
    let mut record = Record::with_start_time(db.clone(), "cycling", ts(0));
    record.add_waypoint(sample(0.0, 0.0, 0)).await.unwrap();
    record.add_waypoint(sample(0.0, 0.001, 100)).await.unwrap();
    let record_id = record.record_id();

    assert!(Record::delete(&db, record_id).await.unwrap());
    assert!(matches!(
        Record::load(&db, record_id).await,
        Err(TrackerError::RecordNotFound(_))
    ));

    // Second delete finds nothing and reports failure.
    assert!(!Record::delete(&db, record_id).await.unwrap());
}

#[tokio::test]
async fn save_assigns_identity_once() {
    let db = db().await;
    let mut record = Record::with_start_time(db, "walking", ts(0));

    assert_eq!(record.record_id(), 0);
    assert_eq!(record.save().await.unwrap(), 1);
    let assigned = record.record_id();
    assert!(assigned > 0);

    record.comment = "updated".to_string();
    assert_eq!(record.save().await.unwrap(), 1);
    assert_eq!(record.record_id(), assigned);
}
