//! Upstream failure classification and the rate-limit cooldown.
//!
//! Every upstream call returns `Result<T, UpstreamError>`; the stages decide
//! what each variant means for them (retry the same step, end the stage, skip
//! the follower, or abort the run).

use serde::Deserialize;
use std::time::Duration;

/// Fixed pause after any rate-limit signal.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Upstream error code for "Rate limit exceeded".
const RATE_LIMIT_CODE: i64 = 88;

/// Error codes meaning the recipient will not accept direct messages.
/// 349: "You cannot send messages to this user."
/// 150: "You cannot send messages to users who are not following you."
pub const REFUSAL_CODES: &[i64] = &[150, 349];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream rate limit exceeded")]
    RateLimited,
    #[error("recipient refuses messages (code {code})")]
    PermanentRefusal { code: i64 },
    #[error("upstream error: {0}")]
    TransientOther(String),
}

impl UpstreamError {
    pub fn other(detail: impl std::fmt::Display) -> Self {
        UpstreamError::TransientOther(detail.to_string())
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        UpstreamError::other(format!("request failed: {}", e))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: i64,
    #[serde(default)]
    message: String,
}

/// Classify a non-success upstream response from its status and body.
pub fn classify(status: u16, body: &str) -> UpstreamError {
    let details = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.errors)
        .unwrap_or_default();

    if status == 429 || details.iter().any(|d| d.code == RATE_LIMIT_CODE) {
        return UpstreamError::RateLimited;
    }
    if let Some(d) = details.iter().find(|d| REFUSAL_CODES.contains(&d.code)) {
        return UpstreamError::PermanentRefusal { code: d.code };
    }
    match details.first() {
        Some(d) => UpstreamError::other(format!("HTTP {} code {}: {}", status, d.code, d.message)),
        None => UpstreamError::other(format!("HTTP {}: {}", status, body.trim())),
    }
}

/// Block the worker for one cooldown period.
pub async fn cooldown(stage: &str) {
    tracing::info!(
        stage,
        minutes = RATE_LIMIT_COOLDOWN.as_secs() / 60,
        "rate limited, sleeping"
    );
    tokio::time::sleep(RATE_LIMIT_COOLDOWN).await;
}
