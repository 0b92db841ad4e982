use super::failure::{cooldown, UpstreamError};
use super::{shutdown_requested, Shutdown};
use crate::store::types::FollowerId;
use crate::store::Store;
use crate::twitter::SocialApi;
use anyhow::Result;

/// Profile lookups accept at most this many ids per request.
pub const LOOKUP_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub batches: usize,
    pub batches_done: usize,
    pub inserted: usize,
    pub already_stored: usize,
    /// A rate limit ended the stage; remaining batches wait for the next run.
    pub rate_limited: bool,
    pub aborted: Option<UpstreamError>,
}

/// `ceil(len / 100)` slices; the last takes whatever remains.
pub fn batches(ids: &[FollowerId]) -> std::slice::Chunks<'_, FollowerId> {
    ids.chunks(LOOKUP_BATCH_SIZE)
}

/// Fetch full profiles for `ids` and store the ones not yet known.
pub async fn enrich(
    api: &dyn SocialApi,
    store: &Store,
    ids: &[FollowerId],
    shutdown: &Shutdown,
) -> Result<Enrichment> {
    let mut report = Enrichment {
        batches: ids.len().div_ceil(LOOKUP_BATCH_SIZE),
        ..Default::default()
    };

    for batch in batches(ids) {
        if shutdown_requested(shutdown) {
            tracing::info!(done = report.batches_done, "shutdown requested, stopping enrichment");
            break;
        }

        let profiles = match api.lookup_profiles(batch).await {
            Ok(profiles) => profiles,
            Err(UpstreamError::RateLimited) => {
                cooldown("enrichment").await;
                report.rate_limited = true;
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, batch = report.batches_done, "profile lookup failed");
                report.aborted = Some(e);
                break;
            }
        };

        for follower in &profiles {
            if store.insert_follower(follower)? {
                tracing::debug!(
                    follower_id = follower.id,
                    name = %follower.name,
                    "stored follower"
                );
                report.inserted += 1;
            } else {
                report.already_stored += 1;
            }
        }
        report.batches_done += 1;
    }

    tracing::info!(
        inserted = report.inserted,
        already_stored = report.already_stored,
        batches = report.batches_done,
        "enrichment finished"
    );
    Ok(report)
}
