//! Read-only statistics and CSV export over the store.

use crate::config::FilterConfig;
use crate::engine::filter::FollowerQuery;
use crate::store::Store;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Follower count reported upstream; `None` when it could not be fetched.
    pub overall_followers: Option<u64>,
    pub fetched_followers: u64,
    pub skipped_followers: u64,
    pub dm_sent: u64,
    pub retry_dm_sent: u64,
}

pub fn stats(store: &Store, overall_followers: Option<u64>) -> Result<Stats> {
    let counts = store.counts()?;
    Ok(Stats {
        overall_followers,
        fetched_followers: counts.followers,
        skipped_followers: counts.skipped,
        dm_sent: counts.messaged,
        retry_dm_sent: counts.retried,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportKind {
    /// Followers under the configured max thresholds.
    HighValue,
    /// Every stored follower.
    Followers,
    /// Every message attempt.
    Attempts,
    /// Every skip-list entry.
    Skips,
}

/// Write the selected records to `path` as CSV with a header row. Returns the row count.
pub fn export(
    store: &Store,
    filters: &FilterConfig,
    kind: ExportKind,
    path: &Path,
) -> Result<usize> {
    let rows = match kind {
        ExportKind::HighValue => {
            write_csv(path, store.query_followers(&FollowerQuery::high_value(filters))?)?
        }
        ExportKind::Followers => write_csv(path, store.query_followers(&FollowerQuery::all())?)?,
        ExportKind::Attempts => write_csv(path, store.all_attempts()?)?,
        ExportKind::Skips => write_csv(path, store.all_skips()?)?,
    };
    tracing::info!(?kind, rows, path = %path.display(), "export written");
    Ok(rows)
}

fn write_csv<T: Serialize>(path: &Path, rows: Vec<T>) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    for row in &rows {
        writer.serialize(row).context("failed to write export row")?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write export file: {}", path.display()))?;
    Ok(rows.len())
}
