//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`status`] - Service health and open alerts
//! - [`service`] - Service listing, registration and watching
//! - [`alert`] - Alert listing and lifecycle actions
//! - [`user`] - User management
//! - [`settings`] - Dashboard settings
//!
//! Every handler reads through a shared [`SyncCache`] and writes through a
//! [`MutationPipeline`] built on the same cache, so the repository can be
//! swapped for a fake in tests.

pub mod alert;
pub mod service;
pub mod settings;
pub mod status;
pub mod user;

#[cfg(test)]
pub(crate) mod fake;

pub use alert::AlertCommand;
pub use service::ServiceCommand;
pub use settings::SettingsCommand;
pub use status::StatusCommand;
pub use user::UserCommand;

use opswatch_client::{CacheKey, EntryState, FetchStatus, Repository, SyncCache};
use tracing::debug;

use crate::error::CliError;

/// Subscribe to `key` and wait for its fetch to settle.
///
/// Returns the settled state. Fails only when there is no data to show; a
/// failed refresh over earlier data is reported through the state instead.
pub(crate) async fn load<R: Repository>(
    cache: &SyncCache<R>,
    key: CacheKey,
) -> Result<EntryState, CliError> {
    let mut subscription = cache.subscribe(key);
    let state = subscription.settled().await;
    debug!(key = %key, status = %state.status, generation = state.generation, "loaded");

    let has_data = cache.snapshot(key).data.is_some();
    match (&state.error, has_data) {
        (Some(error), false) if state.status == FetchStatus::Error => {
            Err(CliError::Client(error.clone()))
        }
        _ => Ok(state),
    }
}

/// Returns `items` filtered by an optional search query.
pub(crate) fn filter<T: serde::Serialize + Clone>(items: &[T], search: Option<&str>) -> Vec<T> {
    opswatch_client::views::search(items, search.unwrap_or_default())
        .into_iter()
        .cloned()
        .collect()
}
