use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-registered monitoring target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Url {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    /// Day-bucketed failure count at which alerts fire.
    pub threshold: u32,
    pub interval: Duration,
    pub day_stats: Vec<DayStat>,
}

impl Url {
    pub fn new(user_id: Uuid, url: String, interval: Duration, threshold: u32) -> Self {
        Self { id: Uuid::new_v4(), user_id, url, threshold, interval, day_stats: Vec::new() }
    }
}

/// Per-calendar-day success/failure counters for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStat {
    pub date: NaiveDate,
    pub success_count: u32,
    pub failure_count: u32,
}

impl DayStat {
    /// Today's bucket date, in UTC.
    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Raised whenever a target's daily failure count crosses a multiple of
/// its threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url_id: Uuid,
    pub url: String,
    pub issued_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(user_id: Uuid, url_id: Uuid, url: String) -> Self {
        Self { id: Uuid::new_v4(), user_id, url_id, url, issued_at: Utc::now() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

/// One entry of the url change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlChangeEvent {
    pub url: Url,
    pub operation: ChangeOperation,
}
