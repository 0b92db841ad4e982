//! Per-follower messaging state machine.
//!
//! A follower's state is derived entirely from the store: the number of
//! attempt rows plus the skip list. `decide` maps that state to one action;
//! [`Messenger`] carries the action out and records the outcome.

use super::failure::{cooldown, UpstreamError};
use super::{shutdown_requested, Shutdown};
use crate::config::MessagingConfig;
use crate::store::types::{Follower, FollowerId, MessageAttempt};
use crate::store::Store;
use crate::twitter::SocialApi;
use anyhow::Result;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Unmessaged,
    Messaged { last: DateTime<Utc> },
    Retried,
    Skipped,
}

impl MessageState {
    pub fn from_records(attempts: &[MessageAttempt], skipped: bool) -> Self {
        if skipped {
            return MessageState::Skipped;
        }
        match attempts {
            [] => MessageState::Unmessaged,
            [only] => MessageState::Messaged { last: only.timestamp },
            _ => MessageState::Retried,
        }
    }

    pub fn load(store: &Store, id: FollowerId) -> Result<Self> {
        let skipped = store.get_skip(id)?.is_some();
        if skipped {
            return Ok(MessageState::Skipped);
        }
        Ok(Self::from_records(&store.list_attempts(id)?, false))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    SendFirst,
    SendRetry,
    /// Messaged once, cooldown not yet elapsed.
    Wait,
    /// Retry already sent; terminal.
    AlreadyHandled,
    /// On the skip list; terminal.
    Excluded,
}

/// Whole days since `last` must exceed `retry_after_days`.
pub fn cooldown_elapsed(last: DateTime<Utc>, now: DateTime<Utc>, retry_after_days: i64) -> bool {
    (now - last).num_days() > retry_after_days
}

pub fn decide(state: MessageState, now: DateTime<Utc>, retry_after_days: i64) -> Decision {
    match state {
        MessageState::Unmessaged => Decision::SendFirst,
        MessageState::Messaged { last } if cooldown_elapsed(last, now, retry_after_days) => {
            Decision::SendRetry
        }
        MessageState::Messaged { .. } => Decision::Wait,
        MessageState::Retried => Decision::AlreadyHandled,
        MessageState::Skipped => Decision::Excluded,
    }
}

/// Greeting line plus template.
pub fn personalize(name: &str, template: &str) -> String {
    format!("Hi {},\n{}", name, template)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub first_sent: usize,
    pub retries_sent: usize,
    pub refused: usize,
    pub waiting: usize,
    pub already_handled: usize,
    pub excluded: usize,
    /// Sends that dry-run mode logged instead of performing.
    pub planned: usize,
    pub rate_limited: bool,
    pub limit_reached: bool,
    /// Set when a non-recoverable upstream error ended the loop.
    pub aborted: Option<UpstreamError>,
}

impl SendReport {
    pub fn sent(&self) -> usize {
        self.first_sent + self.retries_sent
    }
}

pub struct Messenger<'a> {
    api: &'a dyn SocialApi,
    store: &'a Store,
    config: &'a MessagingConfig,
    shutdown: &'a Shutdown,
}

impl<'a> Messenger<'a> {
    pub fn new(
        api: &'a dyn SocialApi,
        store: &'a Store,
        config: &'a MessagingConfig,
        shutdown: &'a Shutdown,
    ) -> Self {
        Self { api, store, config, shutdown }
    }

    /// Walk candidates in order, sending at most `send_limit` messages.
    /// Store failures are returned as errors; upstream outcomes land in the report.
    pub async fn send_to_candidates(&self, candidates: &[Follower]) -> Result<SendReport> {
        let mut report = SendReport::default();
        let now = Utc::now();

        for follower in candidates {
            if shutdown_requested(self.shutdown) {
                tracing::info!("shutdown requested, stopping send loop");
                break;
            }
            if report.sent() + report.planned >= self.config.send_limit {
                tracing::info!(limit = self.config.send_limit, "send limit reached for this run");
                report.limit_reached = true;
                break;
            }

            let state = MessageState::load(self.store, follower.id)?;
            let (template, is_retry) = match decide(state, now, self.config.retry_after_days) {
                Decision::SendFirst => (&self.config.message, false),
                Decision::SendRetry => (&self.config.retry_message, true),
                Decision::Wait => {
                    report.waiting += 1;
                    continue;
                }
                Decision::AlreadyHandled => {
                    tracing::debug!(
                        follower_id = follower.id,
                        name = %follower.name,
                        "already messaged twice"
                    );
                    report.already_handled += 1;
                    continue;
                }
                Decision::Excluded => {
                    report.excluded += 1;
                    continue;
                }
            };

            let text = personalize(&follower.name, template);
            if self.config.dry_run {
                tracing::info!(
                    follower_id = follower.id,
                    name = %follower.name,
                    retry = is_retry,
                    "DRY RUN: would send message"
                );
                report.planned += 1;
                continue;
            }

            tracing::info!(
                follower_id = follower.id,
                name = %follower.name,
                retry = is_retry,
                "sending message"
            );
            match self.api.send_direct_message(follower.id, &text).await {
                Ok(()) => {
                    self.store.append_attempt(follower.id, Utc::now())?;
                    if is_retry {
                        report.retries_sent += 1;
                    } else {
                        report.first_sent += 1;
                    }
                }
                Err(UpstreamError::RateLimited) => {
                    cooldown("messaging").await;
                    report.rate_limited = true;
                    break;
                }
                Err(UpstreamError::PermanentRefusal { code }) => {
                    tracing::warn!(
                        follower_id = follower.id,
                        code,
                        "recipient refuses messages, skipping"
                    );
                    self.store.insert_skip(follower.id, Utc::now())?;
                    report.refused += 1;
                }
                Err(e) => {
                    tracing::error!(
                        follower_id = follower.id,
                        error = %e,
                        "send failed, aborting run"
                    );
                    report.aborted = Some(e);
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Test mode: message the given accounts without touching the store.
    pub async fn send_to_test_accounts(
        &self,
        accounts: &[Follower],
        use_retry: bool,
    ) -> SendReport {
        let mut report = SendReport::default();
        let template = if use_retry { &self.config.retry_message } else { &self.config.message };

        for account in accounts {
            if shutdown_requested(self.shutdown) {
                break;
            }
            let text = personalize(&account.name, template);
            if self.config.dry_run {
                tracing::info!(
                    follower_id = account.id,
                    name = %account.name,
                    retry = use_retry,
                    "DRY RUN: would send test message"
                );
                report.planned += 1;
                continue;
            }

            tracing::info!(
                follower_id = account.id,
                name = %account.name,
                retry = use_retry,
                "sending test message"
            );
            match self.api.send_direct_message(account.id, &text).await {
                Ok(()) if use_retry => report.retries_sent += 1,
                Ok(()) => report.first_sent += 1,
                Err(UpstreamError::RateLimited) => {
                    cooldown("test-messaging").await;
                    report.rate_limited = true;
                    break;
                }
                Err(UpstreamError::PermanentRefusal { code }) => {
                    tracing::warn!(follower_id = account.id, code, "test account refuses messages");
                    report.refused += 1;
                }
                Err(e) => {
                    tracing::error!(
                        follower_id = account.id,
                        error = %e,
                        "test send failed, aborting run"
                    );
                    report.aborted = Some(e);
                    break;
                }
            }
        }

        report
    }
}
