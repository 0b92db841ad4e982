use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Upstream account id. Stored as SQLite INTEGER.
pub type FollowerId = i64;

/// Text layout for every stored timestamp. Lexically ordered, so SQL
/// comparisons on the column match chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ATTEMPT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Follower {
    pub id: FollowerId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub followers_count: i64,
    pub friends_count: i64,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageAttempt {
    pub follower_id: FollowerId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipEntry {
    pub follower_id: FollowerId,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate counts for the stats view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub followers: u64,
    pub skipped: u64,
    /// Followers with at least one attempt.
    pub messaged: u64,
    /// Followers with two or more attempts.
    pub retried: u64,
}

/// One follower as plotted on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowerPoint {
    pub followers_count: i64,
    pub friends_count: i64,
    pub verified: bool,
    /// Messages sent to this follower so far.
    pub attempts: u64,
}

pub fn format_created_at(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_attempt_ts(ts: &DateTime<Utc>) -> String {
    ts.format(ATTEMPT_FORMAT).to_string()
}

/// Parses either stored layout (with or without milliseconds).
pub fn parse_stored_ts(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, PARSE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
