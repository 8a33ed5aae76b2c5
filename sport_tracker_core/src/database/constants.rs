#![allow(dead_code)]

pub const RECORDS_TABLE_NAME: &str = "Records";
pub const RECORD_ID: &str = "record_id";
pub const PROFILE: &str = "profile";
pub const START_TIME: &str = "start_time";
pub const END_TIME: &str = "end_time";
pub const DISTANCE: &str = "distance";
pub const AVERAGE_SPEED: &str = "average_speed";
pub const COMMENT: &str = "comment";

pub const WAYPOINTS_TABLE_NAME: &str = "Waypoints";
pub const WAYPOINT_ID: &str = "waypoint_id";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ALTITUDE: &str = "altitude";
pub const ACCURACY: &str = "accuracy";
pub const SAMPLE_TIME: &str = "sample_time";
