//! Dashboard status command implementation.
//!
//! Shows an overview of:
//! - Service health counters
//! - Active alerts, most recent first

use std::io::Write;

use futures::future;
use opswatch_client::views::Overview;
use opswatch_client::{CacheKey, Repository, SyncCache};

use crate::commands::load;
use crate::error::CliError;
use crate::output::{Freshness, OutputFormat, StatusReport};

/// Status command executor.
pub struct StatusCommand<'a, R> {
    cache: &'a SyncCache<R>,
}

impl<'a, R: Repository> StatusCommand<'a, R> {
    /// Create a new status command.
    #[must_use]
    pub const fn new(cache: &'a SyncCache<R>) -> Self {
        Self { cache }
    }

    /// Execute the status command.
    ///
    /// # Errors
    ///
    /// Returns an error if either collection cannot be loaded or output fails.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<(), CliError> {
        let report = self.fetch_status().await?;
        format.write(writer, &report)?;
        Ok(())
    }

    /// Load services and alerts concurrently and summarize them.
    ///
    /// # Errors
    ///
    /// Returns an error if either collection has no data to show.
    pub async fn fetch_status(&self) -> Result<StatusReport, CliError> {
        let (services_state, alerts_state) = future::try_join(
            load(self.cache, CacheKey::Services),
            load(self.cache, CacheKey::Alerts),
        )
        .await?;

        let services = self.cache.services().data.unwrap_or_default();
        let alerts = self.cache.alerts().data.unwrap_or_default();

        Ok(StatusReport {
            overview: Overview::compute(&services, &alerts),
            services: Freshness::from(&services_state),
            alerts: Freshness::from(&alerts_state),
        })
    }
}
