//! Mutation pipeline: server writes followed by cache invalidation.
//!
//! A mutation is sent to the repository first. Only when the server confirms
//! it are the affected cache keys invalidated (and, if enabled, the returned
//! entity patched in). A failed mutation leaves the cache exactly as it was
//! and hands the error back to the caller. Nothing is applied optimistically.
//!
//! Mutations are not queued against each other; callers that issue several
//! writes to the same entity are responsible for ordering them.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheData, CacheKey, SyncCache};
use crate::error::Result;
use crate::lifecycle::{self, AlertAction, AlertState};
use crate::repository::Repository;
use crate::types::{
    Alert, NewService, NewUser, Service, ServicePatch, Settings, User, UserId, UserPatch,
};

/// A write against the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Register a service.
    CreateService(NewService),
    /// Partially update a service.
    UpdateService {
        /// Service id.
        id: i64,
        /// Fields to change.
        patch: ServicePatch,
    },
    /// Delete a service.
    DeleteService(i64),
    /// Resolve an alert.
    ResolveAlert(i64),
    /// Verify an alert.
    VerifyAlert(i64),
    /// Create a user.
    CreateUser(NewUser),
    /// Partially update a user.
    UpdateUser {
        /// User id.
        id: UserId,
        /// Fields to change.
        patch: UserPatch,
    },
    /// Delete a user.
    DeleteUser(UserId),
    /// Replace the settings.
    SaveSettings(Settings),
}

impl Mutation {
    /// Returns a short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateService(_) => "create_service",
            Self::UpdateService { .. } => "update_service",
            Self::DeleteService(_) => "delete_service",
            Self::ResolveAlert(_) => "resolve_alert",
            Self::VerifyAlert(_) => "verify_alert",
            Self::CreateUser(_) => "create_user",
            Self::UpdateUser { .. } => "update_user",
            Self::DeleteUser(_) => "delete_user",
            Self::SaveSettings(_) => "save_settings",
        }
    }

    /// Cache keys whose data this mutation can change.
    ///
    /// Deleting a service also touches alerts, which reference services.
    #[must_use]
    pub const fn affected_keys(&self) -> &'static [CacheKey] {
        match self {
            Self::CreateService(_) | Self::UpdateService { .. } => &[CacheKey::Services],
            Self::DeleteService(_) => &[CacheKey::Services, CacheKey::Alerts],
            Self::ResolveAlert(_) | Self::VerifyAlert(_) => &[CacheKey::Alerts],
            Self::CreateUser(_) | Self::UpdateUser { .. } | Self::DeleteUser(_) => {
                &[CacheKey::Users]
            }
            Self::SaveSettings(_) => &[CacheKey::Settings],
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::CreateService(service) => service.validate(),
            Self::CreateUser(user) => user.validate(),
            _ => Ok(()),
        }
    }
}

/// What the server returned for a confirmed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// A created or updated service.
    Service(Service),
    /// A service was deleted.
    ServiceDeleted(i64),
    /// An alert after resolve or verify.
    Alert(Alert),
    /// A created or updated user.
    User(User),
    /// A user was deleted.
    UserDeleted(UserId),
    /// The saved settings.
    Settings(Settings),
}

/// Routes operator writes through the repository and settles the cache.
pub struct MutationPipeline<R> {
    cache: SyncCache<R>,
}

impl<R> Clone for MutationPipeline<R> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<R> std::fmt::Debug for MutationPipeline<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPipeline")
            .field("cache", &self.cache)
            .finish()
    }
}

impl<R: Repository> MutationPipeline<R> {
    /// Create a pipeline settling into `cache`.
    #[must_use]
    pub const fn new(cache: SyncCache<R>) -> Self {
        Self { cache }
    }

    /// Returns the cache this pipeline settles into.
    #[must_use]
    pub const fn cache(&self) -> &SyncCache<R> {
        &self.cache
    }

    /// Send `mutation` and, once the server confirms it, invalidate every
    /// affected cache key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClientError::Validation`] for payloads missing a
    /// required field (nothing is sent), or the repository's error unchanged.
    /// On error the cache is not touched.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome> {
        mutation.validate()?;

        let name = mutation.name();
        debug!(mutation = name, "sending mutation");
        let outcome = match self.execute(&mutation).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(mutation = name, error = %error, "mutation failed, cache unchanged");
                return Err(error);
            }
        };

        if self.cache.config().patch_on_mutation {
            self.patch(&outcome);
        }
        for key in mutation.affected_keys() {
            self.cache.invalidate(*key);
        }
        info!(mutation = name, "mutation confirmed");
        Ok(outcome)
    }

    async fn execute(&self, mutation: &Mutation) -> Result<MutationOutcome> {
        let repo = self.cache.repository();
        match mutation {
            Mutation::CreateService(service) => {
                repo.create_service(service).await.map(MutationOutcome::Service)
            }
            Mutation::UpdateService { id, patch } => repo
                .update_service(*id, patch)
                .await
                .map(MutationOutcome::Service),
            Mutation::DeleteService(id) => repo
                .delete_service(*id)
                .await
                .map(|()| MutationOutcome::ServiceDeleted(*id)),
            Mutation::ResolveAlert(id) => repo.resolve_alert(*id).await.map(MutationOutcome::Alert),
            Mutation::VerifyAlert(id) => repo.verify_alert(*id).await.map(MutationOutcome::Alert),
            Mutation::CreateUser(user) => repo.create_user(user).await.map(MutationOutcome::User),
            Mutation::UpdateUser { id, patch } => {
                repo.update_user(id, patch).await.map(MutationOutcome::User)
            }
            Mutation::DeleteUser(id) => repo
                .delete_user(id)
                .await
                .map(|()| MutationOutcome::UserDeleted(id.clone())),
            Mutation::SaveSettings(settings) => repo
                .save_settings(settings)
                .await
                .map(MutationOutcome::Settings),
        }
    }

    fn patch(&self, outcome: &MutationOutcome) {
        match outcome {
            MutationOutcome::Service(service) => {
                self.cache.patch(CacheKey::Services, |data| {
                    if let CacheData::Services(services) = data {
                        upsert(Arc::make_mut(services), service.clone(), |s| s.id == service.id);
                    }
                });
            }
            MutationOutcome::ServiceDeleted(id) => {
                self.cache.patch(CacheKey::Services, |data| {
                    if let CacheData::Services(services) = data {
                        Arc::make_mut(services).retain(|s| s.id != *id);
                    }
                });
            }
            MutationOutcome::Alert(alert) => {
                self.cache.patch(CacheKey::Alerts, |data| {
                    if let CacheData::Alerts(alerts) = data {
                        upsert(Arc::make_mut(alerts), alert.clone(), |a| a.id == alert.id);
                    }
                });
            }
            MutationOutcome::User(user) => {
                self.cache.patch(CacheKey::Users, |data| {
                    if let CacheData::Users(users) = data {
                        upsert(Arc::make_mut(users), user.clone(), |u| u.id == user.id);
                    }
                });
            }
            MutationOutcome::UserDeleted(id) => {
                self.cache.patch(CacheKey::Users, |data| {
                    if let CacheData::Users(users) = data {
                        Arc::make_mut(users).retain(|u| u.id != *id);
                    }
                });
            }
            MutationOutcome::Settings(settings) => {
                self.cache.patch(CacheKey::Settings, |data| {
                    *data = CacheData::Settings(Arc::new(settings.clone()));
                });
            }
        }
    }

    // ============ Services ============

    /// Register a service.
    ///
    /// # Errors
    ///
    /// See [`MutationPipeline::mutate`].
    pub async fn create_service(&self, service: NewService) -> Result<Service> {
        match self.mutate(Mutation::CreateService(service)).await? {
            MutationOutcome::Service(service) => Ok(service),
            other => unreachable_outcome("create_service", &other),
        }
    }

    /// Partially update a service.
    ///
    /// # Errors
    ///
    /// See [`MutationPipeline::mutate`].
    pub async fn update_service(&self, id: i64, patch: ServicePatch) -> Result<Service> {
        match self.mutate(Mutation::UpdateService { id, patch }).await? {
            MutationOutcome::Service(service) => Ok(service),
            other => unreachable_outcome("update_service", &other),
        }
    }

    /// Delete a service.
    ///
    /// # Errors
    ///
    /// See [`MutationPipeline::mutate`].
    pub async fn delete_service(&self, id: i64) -> Result<()> {
        self.mutate(Mutation::DeleteService(id)).await.map(drop)
    }

    // ============ Alerts ============

    /// Resolve `alert`.
    ///
    /// The lifecycle precondition is checked first; the backend's answer is
    /// adopted as-is even if it differs from the predicted state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClientError::InvalidTransition`] without a network
    /// call if the alert is already resolved, otherwise see
    /// [`MutationPipeline::mutate`].
    pub async fn resolve_alert(&self, alert: &Alert) -> Result<Alert> {
        self.alert_action(alert, AlertAction::Resolve).await
    }

    /// Verify `alert`.
    ///
    /// # Errors
    ///
    /// See [`MutationPipeline::mutate`].
    pub async fn verify_alert(&self, alert: &Alert) -> Result<Alert> {
        self.alert_action(alert, AlertAction::Verify).await
    }

    async fn alert_action(&self, alert: &Alert, action: AlertAction) -> Result<Alert> {
        lifecycle::check(alert, action)?;
        let before = AlertState::of(alert);

        let mutation = match action {
            AlertAction::Resolve => Mutation::ResolveAlert(alert.id),
            AlertAction::Verify => Mutation::VerifyAlert(alert.id),
        };
        let updated = match self.mutate(mutation).await? {
            MutationOutcome::Alert(updated) => updated,
            other => return unreachable_outcome(action.as_str(), &other),
        };

        let after = AlertState::of(&updated);
        if lifecycle::expected(before, action) != Some(after) {
            debug!(
                alert_id = alert.id,
                %action,
                %before,
                %after,
                "server applied a different transition than predicted"
            );
        }
        if !updated.is_consistent() {
            warn!(alert_id = updated.id, status = %updated.status, "server returned alert with inconsistent resolved_at");
        }
        Ok(updated)
    }

    // ============ Users ============

    /// Create a user.
    ///
    /// # Errors
    ///
    /// See [`MutationPipeline::mutate`].
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        match self.mutate(Mutation::CreateUser(user)).await? {
            MutationOutcome::User(user) => Ok(user),
            other => unreachable_outcome("create_user", &other),
        }
    }

    /// Partially update a user.
    ///
    /// # Errors
    ///
    /// See [`MutationPipeline::mutate`].
    pub async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User> {
        match self.mutate(Mutation::UpdateUser { id, patch }).await? {
            MutationOutcome::User(user) => Ok(user),
            other => unreachable_outcome("update_user", &other),
        }
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// See [`MutationPipeline::mutate`].
    pub async fn delete_user(&self, id: UserId) -> Result<()> {
        self.mutate(Mutation::DeleteUser(id)).await.map(drop)
    }

    // ============ Settings ============

    /// Replace the settings.
    ///
    /// # Errors
    ///
    /// See [`MutationPipeline::mutate`].
    pub async fn save_settings(&self, settings: Settings) -> Result<Settings> {
        match self.mutate(Mutation::SaveSettings(settings)).await? {
            MutationOutcome::Settings(settings) => Ok(settings),
            other => unreachable_outcome("save_settings", &other),
        }
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

fn unreachable_outcome<T>(operation: &str, outcome: &MutationOutcome) -> Result<T> {
    Err(crate::error::ClientError::Decode(format!(
        "{operation} produced unexpected outcome {outcome:?}"
    )))
}
