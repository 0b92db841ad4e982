#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use follower_outreach::config::Config;
use follower_outreach::engine::failure::UpstreamError;
use follower_outreach::store::types::{Follower, FollowerId};
use follower_outreach::twitter::types::{Cursor, IdPage};
use follower_outreach::twitter::SocialApi;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::watch;

pub const MESSAGE: &str = "Thanks for following!";
pub const RETRY_MESSAGE: &str = "Checking in again.";

pub fn config(extra: &str) -> Config {
    let toml = format!(
        r#"
        [messaging]
        message = "{}"
        retry_message = "{}"
        retry_after_days = 7
        send_limit = 10
        {}
        "#,
        MESSAGE, RETRY_MESSAGE, extra
    );
    Config::from_toml(&toml).unwrap()
}

pub fn follower(id: FollowerId, followers_count: i64, verified: bool) -> Follower {
    Follower {
        id,
        name: format!("user{}", id),
        created_at: Utc.with_ymd_and_hms(2016, 4, 1, 9, 30, 0).unwrap(),
        description: format!("bio of {}", id),
        followers_count,
        friends_count: 20,
        verified,
    }
}

/// Shutdown flag that stays unset. The sender is dropped, so only
/// `borrow()`-style checks are meaningful on the receiver.
pub fn no_shutdown() -> watch::Receiver<bool> {
    watch::channel(false).1
}

/// Scripted upstream. Page `i` of the feed is requested with cursor `i`
/// (the first page with `Cursor::START`).
#[derive(Default)]
pub struct FakeApi {
    pub total_followers: u64,
    pages: Vec<Vec<FollowerId>>,
    profiles: HashMap<FollowerId, Follower>,
    screen_names: HashMap<String, Follower>,
    feed_failures: Mutex<VecDeque<(usize, UpstreamError)>>,
    lookup_failures: Mutex<VecDeque<(usize, UpstreamError)>>,
    send_failures: Mutex<HashMap<FollowerId, UpstreamError>>,
    pub feed_calls: Mutex<Vec<i64>>,
    pub lookup_calls: Mutex<Vec<usize>>,
    pub sent: Mutex<Vec<(FollowerId, String)>>,
    pub calls: Mutex<usize>,
    shutdown_after_sends: Mutex<Option<(usize, watch::Sender<bool>)>>,
    shutdown_after_lookups: Mutex<Option<(usize, watch::Sender<bool>)>>,
}

impl FakeApi {
    pub fn new(total_followers: u64) -> Self {
        Self { total_followers, ..Default::default() }
    }

    pub fn with_pages(mut self, pages: Vec<Vec<FollowerId>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = Follower>) -> Self {
        self.profiles.extend(profiles.into_iter().map(|f| (f.id, f)));
        self
    }

    pub fn with_screen_name(mut self, name: &str, profile: Follower) -> Self {
        self.screen_names.insert(name.to_string(), profile);
        self
    }

    /// Fail the feed call with this 0-based call index.
    pub fn fail_feed_call(self, call: usize, err: UpstreamError) -> Self {
        self.feed_failures.lock().unwrap().push_back((call, err));
        self
    }

    pub fn fail_lookup_call(self, call: usize, err: UpstreamError) -> Self {
        self.lookup_failures.lock().unwrap().push_back((call, err));
        self
    }

    pub fn fail_send(self, id: FollowerId, err: UpstreamError) -> Self {
        self.send_failures.lock().unwrap().insert(id, err);
        self
    }

    /// Flip `shutdown` once `n` messages have gone out.
    pub fn shutdown_after_sends(self, n: usize, shutdown: watch::Sender<bool>) -> Self {
        *self.shutdown_after_sends.lock().unwrap() = Some((n, shutdown));
        self
    }

    /// Flip `shutdown` once `n` lookup batches have been answered.
    pub fn shutdown_after_lookups(self, n: usize, shutdown: watch::Sender<bool>) -> Self {
        *self.shutdown_after_lookups.lock().unwrap() = Some((n, shutdown));
        self
    }

    pub fn sent_ids(&self) -> Vec<FollowerId> {
        self.sent.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    pub fn sent_text(&self, id: FollowerId) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .find(|(sent_id, _)| *sent_id == id)
            .map(|(_, text)| text.clone())
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn count_call(&self) {
        *self.calls.lock().unwrap() += 1;
    }

    fn trip(hook: &Mutex<Option<(usize, watch::Sender<bool>)>>, count: usize) {
        if let Some((n, tx)) = hook.lock().unwrap().as_ref() {
            if count >= *n {
                tx.send_replace(true);
            }
        }
    }

    fn scripted(
        failures: &Mutex<VecDeque<(usize, UpstreamError)>>,
        call: usize,
    ) -> Option<UpstreamError> {
        let mut failures = failures.lock().unwrap();
        let pos = failures.iter().position(|(n, _)| *n == call)?;
        failures.remove(pos).map(|(_, err)| err)
    }
}

#[async_trait]
impl SocialApi for FakeApi {
    async fn follower_count(&self) -> Result<u64, UpstreamError> {
        self.count_call();
        Ok(self.total_followers)
    }

    async fn follower_id_page(&self, cursor: Cursor) -> Result<IdPage, UpstreamError> {
        self.count_call();
        let call = {
            let mut calls = self.feed_calls.lock().unwrap();
            calls.push(cursor.value());
            calls.len() - 1
        };
        if let Some(err) = Self::scripted(&self.feed_failures, call) {
            return Err(err);
        }
        let index = if cursor == Cursor::START { 0 } else { cursor.value() as usize };
        let ids = self.pages.get(index).cloned().unwrap_or_default();
        let next = if index + 1 < self.pages.len() {
            Cursor::from_next((index + 1) as i64)
        } else {
            None
        };
        Ok(IdPage { ids, next })
    }

    async fn lookup_profiles(
        &self,
        ids: &[FollowerId],
    ) -> Result<Vec<Follower>, UpstreamError> {
        self.count_call();
        let call = {
            let mut calls = self.lookup_calls.lock().unwrap();
            calls.push(ids.len());
            calls.len() - 1
        };
        if let Some(err) = Self::scripted(&self.lookup_failures, call) {
            return Err(err);
        }
        Self::trip(&self.shutdown_after_lookups, call + 1);
        Ok(ids.iter().filter_map(|id| self.profiles.get(id).cloned()).collect())
    }

    async fn lookup_screen_names(
        &self,
        names: &[String],
    ) -> Result<Vec<Follower>, UpstreamError> {
        self.count_call();
        Ok(names.iter().filter_map(|n| self.screen_names.get(n).cloned()).collect())
    }

    async fn send_direct_message(
        &self,
        recipient: FollowerId,
        text: &str,
    ) -> Result<(), UpstreamError> {
        self.count_call();
        if let Some(err) = self.send_failures.lock().unwrap().get(&recipient).cloned() {
            return Err(err);
        }
        let count = {
            let mut sent = self.sent.lock().unwrap();
            sent.push((recipient, text.to_string()));
            sent.len()
        };
        Self::trip(&self.shutdown_after_sends, count);
        Ok(())
    }
}
