//! One run: discovery → enrichment → filter → messaging.
//!
//! No stage persists a resume cursor; the next run picks up from the store.

use crate::config::{Config, ConfigError};
use crate::engine::discovery::{discovery_target, Discovery, DiscoveryWalker};
use crate::engine::enrichment::{enrich, Enrichment};
use crate::engine::failure::{cooldown, UpstreamError};
use crate::engine::filter::FollowerQuery;
use crate::engine::messaging::{Messenger, SendReport};
use crate::engine::{shutdown_requested, Shutdown};
use crate::store::Store;
use crate::twitter::SocialApi;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub test_mode: bool,
    pub total_followers: u64,
    pub discovery: Discovery,
    pub enrichment: Enrichment,
    pub candidates: usize,
    pub sends: SendReport,
    /// The run stopped before messaging (rate limit before the send loop, or shutdown).
    pub ended_early: bool,
}

#[derive(Clone)]
pub struct Pipeline {
    api: Arc<dyn SocialApi>,
    store: Arc<Store>,
    config: Arc<Config>,
    shutdown: Shutdown,
}

impl Pipeline {
    pub fn new(
        api: Arc<dyn SocialApi>,
        store: Arc<Store>,
        config: Arc<Config>,
        shutdown: Shutdown,
    ) -> Self {
        Self { api, store, config, shutdown }
    }

    /// Execute a full run. Durable writes made before a failure are kept.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        self.config.validate()?;
        if self.config.test.enabled {
            return self.run_test_mode().await;
        }

        let mut report = RunReport::default();
        let api = self.api.as_ref();
        let store = self.store.as_ref();
        let messaging = &self.config.messaging;

        report.total_followers = match api.follower_count().await {
            Ok(n) => n,
            Err(UpstreamError::RateLimited) => {
                cooldown("account").await;
                report.ended_early = true;
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let target = discovery_target(report.total_followers, messaging.send_limit);
        tracing::info!(total = report.total_followers, target, "fetching follower ids");
        let walker = DiscoveryWalker::new(api, store, messaging.retry_after_days, &self.shutdown);
        report.discovery = walker.walk(target).await?;
        tracing::info!(
            collected = report.discovery.ids.len(),
            new = report.discovery.new_followers,
            retry_due = report.discovery.retry_due,
            "discovery finished"
        );

        // Ids collected before a feed failure are still enriched.
        if report.discovery.ids.is_empty() {
            tracing::info!("no new follower information");
        } else {
            report.enrichment = enrich(api, store, &report.discovery.ids, &self.shutdown).await?;
        }

        let aborted = report.discovery.aborted.clone();
        if let Some(e) = aborted.or_else(|| report.enrichment.aborted.clone()) {
            return Err(e.into());
        }
        // Remaining batches and all sends wait for the next scheduled run.
        if report.enrichment.rate_limited {
            tracing::info!("enrichment rate limited, ending run");
            report.ended_early = true;
            return Ok(report);
        }
        if shutdown_requested(&self.shutdown) {
            report.ended_early = true;
            return Ok(report);
        }

        let candidates = store.query_followers(&FollowerQuery::candidates(&self.config.filters))?;
        report.candidates = candidates.len();
        tracing::info!(
            candidates = candidates.len(),
            dry_run = messaging.dry_run,
            "sending messages"
        );

        let messenger = Messenger::new(api, store, messaging, &self.shutdown);
        report.sends = messenger.send_to_candidates(&candidates).await?;
        log_sends(&report.sends);
        if let Some(e) = report.sends.aborted.clone() {
            return Err(e.into());
        }
        Ok(report)
    }

    /// Message the configured test accounts; nothing is read from or written to the store.
    async fn run_test_mode(&self) -> Result<RunReport, RunError> {
        let mut report = RunReport { test_mode: true, ..Default::default() };
        let accounts = self.config.test.capped_accounts();
        tracing::info!(accounts = ?accounts, "test mode: messaging test accounts");

        let profiles = match self.api.lookup_screen_names(accounts).await {
            Ok(p) => p,
            Err(UpstreamError::RateLimited) => {
                cooldown("test-lookup").await;
                report.ended_early = true;
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };
        report.candidates = profiles.len();

        let messenger = Messenger::new(
            self.api.as_ref(),
            self.store.as_ref(),
            &self.config.messaging,
            &self.shutdown,
        );
        report.sends = messenger
            .send_to_test_accounts(&profiles, self.config.test.retry_message)
            .await;
        log_sends(&report.sends);
        if let Some(e) = report.sends.aborted.clone() {
            return Err(e.into());
        }
        Ok(report)
    }
}

fn log_sends(sends: &SendReport) {
    tracing::info!(
        first = sends.first_sent,
        retries = sends.retries_sent,
        refused = sends.refused,
        waiting = sends.waiting,
        already_handled = sends.already_handled,
        planned = sends.planned,
        rate_limited = sends.rate_limited,
        "send loop finished"
    );
}
