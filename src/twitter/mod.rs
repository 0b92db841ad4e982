pub mod auth;
pub mod rest;
pub mod types;

use crate::engine::failure::UpstreamError;
use crate::store::types::{Follower, FollowerId};
use async_trait::async_trait;
use types::{Cursor, IdPage};

/// Upstream calls consumed by the engine. Every call returns a classified
/// [`UpstreamError`] on failure.
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Follower count of the authenticated account.
    async fn follower_count(&self) -> Result<u64, UpstreamError>;

    async fn follower_id_page(&self, cursor: Cursor) -> Result<IdPage, UpstreamError>;

    /// Full profiles for at most 100 ids. Unknown ids are silently dropped.
    async fn lookup_profiles(&self, ids: &[FollowerId]) -> Result<Vec<Follower>, UpstreamError>;

    /// Full profiles for at most 100 screen names.
    async fn lookup_screen_names(
        &self,
        names: &[String],
    ) -> Result<Vec<Follower>, UpstreamError>;

    async fn send_direct_message(
        &self,
        recipient: FollowerId,
        text: &str,
    ) -> Result<(), UpstreamError>;
}
