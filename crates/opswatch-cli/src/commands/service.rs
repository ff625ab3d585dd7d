//! Service command implementation.
//!
//! Handles listing, registration, updates, deletion and live watching of
//! monitored services.

use std::io::Write;

use chrono::Utc;
use opswatch_client::views::HealthCounters;
use opswatch_client::{
    CacheEvent, CacheKey, MutationPipeline, NewService, Repository, ServicePatch, SyncCache,
};
use tracing::{debug, info};

use crate::cli::{CreateServiceArgs, ServiceCommands, UpdateServiceArgs};
use crate::commands::{filter, load};
use crate::error::CliError;
use crate::output::{ActionResponse, Freshness, OutputFormat, ServiceList, WatchTick};

/// Handler for service subcommands.
pub struct ServiceCommand<'a, R> {
    cache: &'a SyncCache<R>,
}

impl<'a, R: Repository> ServiceCommand<'a, R> {
    /// Creates a new service command handler.
    #[must_use]
    pub const fn new(cache: &'a SyncCache<R>) -> Self {
        Self { cache }
    }

    /// Executes the service subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &ServiceCommands,
    ) -> Result<(), CliError> {
        match command {
            ServiceCommands::List { search } => self.list(out, format, search.as_deref()).await,
            ServiceCommands::Create(args) => self.create(out, format, args).await,
            ServiceCommands::Update(args) => self.update(out, format, args).await,
            ServiceCommands::Delete { id } => self.delete(out, format, *id).await,
            ServiceCommands::Watch { count } => self.watch(out, format, *count).await,
        }
    }

    async fn list<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        search: Option<&str>,
    ) -> Result<(), CliError> {
        let state = load(self.cache, CacheKey::Services).await?;
        let services = self.cache.services().data.unwrap_or_default();

        let list = ServiceList {
            health: HealthCounters::from_services(&services),
            services: filter(&services, search),
            freshness: Freshness::from(&state),
        };
        format.write(out, &list)
    }

    async fn create<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &CreateServiceArgs,
    ) -> Result<(), CliError> {
        let mut new = NewService::new(&args.name, &args.service_type, &args.url);
        if let Some(config) = &args.config {
            new = new.with_config(config);
        }

        let created = MutationPipeline::new(self.cache.clone())
            .create_service(new)
            .await?;
        info!(id = created.id, name = %created.name, "service created");

        let response = ActionResponse::new(
            format!("Service '{}' created with id {}", created.name, created.id),
            Some(created),
        );
        format.write(out, &response)
    }

    async fn update<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &UpdateServiceArgs,
    ) -> Result<(), CliError> {
        let patch = ServicePatch {
            name: args.name.clone(),
            service_type: args.service_type.clone(),
            url: args.url.clone(),
            config: args.config.clone(),
        };
        if patch.is_empty() {
            return Err(CliError::InvalidArgument(
                "nothing to update, pass at least one of --name, --type, --url, --config".into(),
            ));
        }

        let updated = MutationPipeline::new(self.cache.clone())
            .update_service(args.id, patch)
            .await?;

        let response = ActionResponse::new(format!("Service {} updated", updated.id), Some(updated));
        format.write(out, &response)
    }

    async fn delete<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        id: i64,
    ) -> Result<(), CliError> {
        MutationPipeline::new(self.cache.clone())
            .delete_service(id)
            .await?;

        let response: ActionResponse<()> = ActionResponse::new(format!("Service {id} deleted"), None);
        format.write(out, &response)
    }

    /// Print a line for every settled services refresh until `count` is
    /// reached or the process is interrupted.
    async fn watch<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        count: Option<usize>,
    ) -> Result<(), CliError> {
        let mut subscription = self.cache.subscribe(CacheKey::Services);
        let mut printed = 0usize;
        debug!(?count, "watching services");

        loop {
            let event = tokio::select! {
                event = subscription.next_event() => event,
                _ = tokio::signal::ctrl_c() => {
                    debug!("interrupted");
                    return Ok(());
                }
            };

            match event {
                Some(CacheEvent::Ready { .. } | CacheEvent::Failed { .. }) => {}
                // Lagged; fall back to the current state if it has settled.
                None if subscription.state().is_settled() => {}
                _ => continue,
            }

            let services = self.cache.services().data.unwrap_or_default();
            let tick = WatchTick {
                at: Utc::now(),
                health: HealthCounters::from_services(&services),
                freshness: Freshness::from(&subscription.state()),
            };
            format.write(out, &tick)?;
            out.flush()?;

            printed += 1;
            if count.is_some_and(|limit| printed >= limit) {
                return Ok(());
            }
        }
    }
}
