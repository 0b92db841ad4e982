use crate::report::{self, Stats};
use crate::store::types::FollowerPoint;
use crate::store::Store;
use std::time::Instant;

/// Followers vs friends on log10 axes, split by the verified flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scatter {
    pub verified: Vec<(f64, f64)>,
    pub unverified: Vec<(f64, f64)>,
    pub verified_dms: u64,
    pub unverified_dms: u64,
    /// Upper bound shared by both axes, in whole decades.
    pub bound: f64,
}

impl Scatter {
    pub fn from_points(points: &[FollowerPoint]) -> Self {
        let mut scatter = Scatter { bound: 1.0, ..Default::default() };
        for p in points {
            let xy = (log_scale(p.followers_count), log_scale(p.friends_count));
            scatter.bound = scatter.bound.max(xy.0.ceil()).max(xy.1.ceil());
            if p.verified {
                scatter.verified.push(xy);
                scatter.verified_dms += p.attempts;
            } else {
                scatter.unverified.push(xy);
                scatter.unverified_dms += p.attempts;
            }
        }
        scatter
    }
}

/// `log10(n + 1)`, so zero counts sit on the axis.
pub fn log_scale(n: i64) -> f64 {
    (n.max(0) as f64 + 1.0).log10()
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    pub stats: Stats,
    pub scatter: Scatter,
    pub start_time: Instant,
    pub last_refresh: Option<String>,
    pub error: Option<String>,
}

impl DashboardState {
    pub fn new(overall_followers: Option<u64>) -> Self {
        Self {
            stats: Stats {
                overall_followers,
                ..Default::default()
            },
            scatter: Scatter::from_points(&[]),
            start_time: Instant::now(),
            last_refresh: None,
            error: None,
        }
    }

    /// Re-read counts from the store. The upstream total is fetched once at startup.
    pub fn refresh(&mut self, store: &Store) {
        let refreshed = report::stats(store, self.stats.overall_followers)
            .and_then(|stats| Ok((stats, store.follower_points()?)));
        match refreshed {
            Ok((stats, points)) => {
                self.stats = stats;
                self.scatter = Scatter::from_points(&points);
                self.error = None;
            }
            Err(e) => self.error = Some(format!("{:#}", e)),
        }
        self.last_refresh = Some(chrono::Local::now().format("%H:%M:%S").to_string());
    }

    /// Share of upstream followers already in the store, 0.0..=1.0.
    pub fn fetched_ratio(&self) -> f64 {
        match self.stats.overall_followers {
            Some(total) if total > 0 => {
                (self.stats.fetched_followers as f64 / total as f64).min(1.0)
            }
            _ => 0.0,
        }
    }

    pub fn uptime(&self) -> String {
        let secs = self.start_time.elapsed().as_secs();
        let h = secs / 3600;
        let m = (secs % 3600) / 60;
        format!("{}h {:02}m", h, m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_ratio_clamped() {
        let mut state = DashboardState::new(Some(10));
        state.stats.fetched_followers = 25;
        assert_eq!(state.fetched_ratio(), 1.0);
        state.stats.fetched_followers = 5;
        assert_eq!(state.fetched_ratio(), 0.5);
    }

    #[test]
    fn test_fetched_ratio_without_total() {
        assert_eq!(DashboardState::new(None).fetched_ratio(), 0.0);
        assert_eq!(DashboardState::new(Some(0)).fetched_ratio(), 0.0);
    }

    fn point(followers: i64, friends: i64, verified: bool, attempts: u64) -> FollowerPoint {
        FollowerPoint { followers_count: followers, friends_count: friends, verified, attempts }
    }

    #[test]
    fn test_scatter_splits_by_verified() {
        let scatter = Scatter::from_points(&[
            point(99, 9, true, 1),
            point(0, 999, false, 2),
            point(9, 0, false, 0),
        ]);
        assert_eq!(scatter.verified, vec![(2.0, 1.0)]);
        assert_eq!(scatter.unverified, vec![(0.0, 3.0), (1.0, 0.0)]);
        assert_eq!(scatter.verified_dms, 1);
        assert_eq!(scatter.unverified_dms, 2);
        assert_eq!(scatter.bound, 3.0);
    }

    #[test]
    fn test_empty_scatter_has_unit_bound() {
        let scatter = Scatter::from_points(&[]);
        assert!(scatter.verified.is_empty() && scatter.unverified.is_empty());
        assert_eq!(scatter.bound, 1.0);
    }

    #[test]
    fn test_refresh_reads_store() {
        let store = Store::open_memory().unwrap();
        store.insert_skip(3, chrono::Utc::now()).unwrap();
        let mut state = DashboardState::new(Some(100));
        state.refresh(&store);
        assert_eq!(state.stats.skipped_followers, 1);
        assert_eq!(state.stats.overall_followers, Some(100));
        assert!(state.last_refresh.is_some());
        assert!(state.error.is_none());
    }
}
