//! Follower discovery: walks the upstream follower-id feed and collects ids
//! that need enrichment (unknown followers) or re-processing (retry due).

use super::failure::{cooldown, UpstreamError};
use super::messaging::{decide, Decision, MessageState};
use super::{shutdown_requested, Shutdown};
use crate::store::types::FollowerId;
use crate::store::Store;
use crate::twitter::types::Cursor;
use crate::twitter::SocialApi;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;

/// Number of ids to collect: the account's follower count, capped at twice
/// the send limit to leave room for followers the filter will drop.
pub fn discovery_target(total_followers: u64, send_limit: usize) -> usize {
    let cap = send_limit.saturating_mul(2);
    usize::try_from(total_followers).map_or(cap, |total| total.min(cap))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Ids to enrich, in feed order.
    pub ids: Vec<FollowerId>,
    pub new_followers: usize,
    pub retry_due: usize,
    pub pages: usize,
    pub rate_limit_pauses: usize,
    /// Set when a non-recoverable upstream error ended the walk early.
    /// `ids` still holds everything collected before it.
    pub aborted: Option<UpstreamError>,
}

pub struct DiscoveryWalker<'a> {
    api: &'a dyn SocialApi,
    store: &'a Store,
    retry_after_days: i64,
    shutdown: &'a Shutdown,
}

impl<'a> DiscoveryWalker<'a> {
    pub fn new(
        api: &'a dyn SocialApi,
        store: &'a Store,
        retry_after_days: i64,
        shutdown: &'a Shutdown,
    ) -> Self {
        Self { api, store, retry_after_days, shutdown }
    }

    pub async fn walk(&self, target: usize) -> Result<Discovery> {
        let mut found = Discovery::default();
        let mut seen: HashSet<FollowerId> = HashSet::new();
        let mut cursor = Some(Cursor::START);
        let now = Utc::now();

        if target == 0 {
            return Ok(found);
        }

        while let Some(current) = cursor {
            if shutdown_requested(self.shutdown) {
                tracing::info!(
                    collected = found.ids.len(),
                    "shutdown requested, stopping discovery"
                );
                break;
            }

            let page = match self.api.follower_id_page(current).await {
                Ok(page) => page,
                Err(UpstreamError::RateLimited) => {
                    found.rate_limit_pauses += 1;
                    cooldown("discovery").await;
                    // same cursor again
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        collected = found.ids.len(),
                        "follower feed failed"
                    );
                    found.aborted = Some(e);
                    break;
                }
            };
            found.pages += 1;

            for id in page.ids {
                if !seen.insert(id) {
                    continue;
                }
                if self.wants(id, now, &mut found)? {
                    found.ids.push(id);
                    if found.ids.len() >= target {
                        tracing::info!(target, "discovery target reached");
                        return Ok(found);
                    }
                }
            }
            cursor = page.next;
        }

        Ok(found)
    }

    /// Unknown, non-skipped followers are new; known followers come back only
    /// when their retry is due.
    fn wants(
        &self,
        id: FollowerId,
        now: chrono::DateTime<Utc>,
        found: &mut Discovery,
    ) -> Result<bool> {
        if self.store.get_follower(id)?.is_none() {
            if self.store.get_skip(id)?.is_some() {
                return Ok(false);
            }
            found.new_followers += 1;
            return Ok(true);
        }
        let state = MessageState::load(self.store, id)?;
        if decide(state, now, self.retry_after_days) == Decision::SendRetry {
            found.retry_due += 1;
            return Ok(true);
        }
        Ok(false)
    }
}
