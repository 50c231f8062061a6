//! The statistics provider seam

use crate::error::FetchError;
use async_trait::async_trait;
use core_pipeline::StatsRecord;

/// Looks up one player's statistics.
///
/// `Ok(None)` means the provider has no record for `name`.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Option<StatsRecord>, FetchError>;
}
