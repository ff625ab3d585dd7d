//! Alert command implementation.
//!
//! Handles alert listing and the resolve/verify lifecycle actions.

use std::io::Write;

use opswatch_client::views::AlertPartition;
use opswatch_client::{Alert, AlertAction, CacheKey, MutationPipeline, Repository, SyncCache};
use tracing::info;

use crate::cli::{AlertCommands, AlertFilter};
use crate::commands::{filter, load};
use crate::error::CliError;
use crate::output::{ActionResponse, AlertList, Freshness, OutputFormat};

/// Handler for alert subcommands.
pub struct AlertCommand<'a, R> {
    cache: &'a SyncCache<R>,
}

impl<'a, R: Repository> AlertCommand<'a, R> {
    /// Creates a new alert command handler.
    #[must_use]
    pub const fn new(cache: &'a SyncCache<R>) -> Self {
        Self { cache }
    }

    /// Executes the alert subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &AlertCommands,
    ) -> Result<(), CliError> {
        match command {
            AlertCommands::List { state, search } => {
                self.list(out, format, *state, search.as_deref()).await
            }
            AlertCommands::Resolve { id } => {
                self.act(out, format, *id, AlertAction::Resolve).await
            }
            AlertCommands::Verify { id } => self.act(out, format, *id, AlertAction::Verify).await,
        }
    }

    async fn list<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        state: AlertFilter,
        search: Option<&str>,
    ) -> Result<(), CliError> {
        let entry = load(self.cache, CacheKey::Alerts).await?;
        let alerts = self.cache.alerts().data.unwrap_or_default();

        let partition = AlertPartition::from_alerts(&alerts);
        let selected = match state {
            AlertFilter::Active => partition.active,
            AlertFilter::Resolved => partition.resolved,
            AlertFilter::All => alerts.to_vec(),
        };

        let list = AlertList::new(filter(&selected, search), Freshness::from(&entry));
        format.write(out, &list)
    }

    async fn act<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        id: i64,
        action: AlertAction,
    ) -> Result<(), CliError> {
        let alert = self.find(id).await?;
        let pipeline = MutationPipeline::new(self.cache.clone());
        let updated = match action {
            AlertAction::Resolve => pipeline.resolve_alert(&alert).await?,
            AlertAction::Verify => pipeline.verify_alert(&alert).await?,
        };
        info!(alert_id = id, %action, status = %updated.status, "alert updated");

        let message = match action {
            AlertAction::Resolve => format!("Alert {id} resolved"),
            AlertAction::Verify => format!("Alert {id} verified"),
        };
        format.write(out, &ActionResponse::new(message, Some(updated)))
    }

    async fn find(&self, id: i64) -> Result<Alert, CliError> {
        load(self.cache, CacheKey::Alerts).await?;
        self.cache
            .alerts()
            .data
            .and_then(|alerts| alerts.iter().find(|a| a.id == id).cloned())
            .ok_or_else(|| CliError::not_found("alert", id))
    }
}
