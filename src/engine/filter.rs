//! Follower selection predicates.
//!
//! A [`FollowerQuery`] is a conjunction of [`Condition`]s. Thresholds that are
//! not configured produce no condition at all, so an empty query matches every
//! stored follower.

use crate::config::FilterConfig;
use crate::store::types::format_created_at;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    CreatedAtMost(DateTime<Utc>),
    FollowersAtLeast(i64),
    FriendsAtLeast(i64),
    FollowersBelow(i64),
    FriendsBelow(i64),
    Verified(bool),
}

impl Condition {
    fn sql(&self) -> (&'static str, Value) {
        match *self {
            Condition::CreatedAtMost(ts) => {
                ("created_at <= ?", Value::Text(format_created_at(&ts)))
            }
            Condition::FollowersAtLeast(min) => ("followers_count >= ?", Value::Integer(min)),
            Condition::FriendsAtLeast(min) => ("friends_count >= ?", Value::Integer(min)),
            Condition::FollowersBelow(max) => ("followers_count < ?", Value::Integer(max)),
            Condition::FriendsBelow(max) => ("friends_count < ?", Value::Integer(max)),
            Condition::Verified(flag) => ("verified = ?", Value::Integer(flag as i64)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowerQuery {
    conditions: Vec<Condition>,
}

impl FollowerQuery {
    /// Matches every follower.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Message eligibility. The verified flag is always part of the predicate.
    pub fn candidates(filters: &FilterConfig) -> Self {
        let mut query = Self::all();
        if let Some(raw) = filters.created_before.as_deref() {
            match parse_created_before(raw) {
                Some(ts) => query = query.with(Condition::CreatedAtMost(ts)),
                None => tracing::warn!(
                    created_before = raw,
                    "ignoring unparseable created_before filter"
                ),
            }
        }
        if let Some(min) = threshold(filters.min_followers_count) {
            query = query.with(Condition::FollowersAtLeast(min));
        }
        if let Some(min) = threshold(filters.min_friends_count) {
            query = query.with(Condition::FriendsAtLeast(min));
        }
        query.with(Condition::Verified(filters.verified_only))
    }

    /// Upper-bound variant used for reporting and export only.
    pub fn high_value(filters: &FilterConfig) -> Self {
        let mut query = Self::all();
        if let Some(max) = threshold(filters.max_followers_count) {
            query = query.with(Condition::FollowersBelow(max));
        }
        if let Some(max) = threshold(filters.max_friends_count) {
            query = query.with(Condition::FriendsBelow(max));
        }
        query
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Renders a `WHERE` clause (empty when there are no conditions) and its
    /// positional parameters.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        if self.conditions.is_empty() {
            return (String::new(), Vec::new());
        }
        let (clauses, params): (Vec<&str>, Vec<Value>) =
            self.conditions.iter().map(Condition::sql).unzip();
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

fn threshold(value: Option<u64>) -> Option<i64> {
    value
        .filter(|&n| n > 0)
        .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_created_before(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
