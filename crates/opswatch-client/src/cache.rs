//! Synchronization cache for server-owned collections.
//!
//! The cache keeps one entry per [`CacheKey`]. Entries are filled by
//! fetching through a [`Repository`] and kept fresh according to the key's
//! [`RefreshPolicy`]:
//!
//! - **On demand** (alerts, users, settings): fetched on the first
//!   subscription that finds no fresh data, then only after invalidation.
//! - **Poll** (services): additionally re-fetched on a fixed period while at
//!   least one [`Subscription`] is alive. The timer is started when the
//!   subscriber count goes 0 → 1 and aborted when it drops back to 0.
//!
//! Every fetch carries a generation number. At most one fetch per key is
//! current; invalidations that arrive while it is in flight coalesce into a
//! single follow-up fetch, and a response from a superseded generation is
//! discarded instead of overwriting newer data.
//!
//! On failure the previous data stays readable and the entry records the
//! error together with a consecutive-failure count, so a failed background
//! poll is distinguishable from an up-to-date entry.
//!
//! The cache is an explicit instance: create one per session, hand clones to
//! whoever needs it, and [`SyncCache::clear`] it on logout.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::CacheConfig;
use crate::error::{ClientError, Result};
use crate::repository::Repository;
use crate::types::{Alert, Service, Settings, User};

/// Identifies a cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKey {
    /// All services.
    Services,
    /// All alerts.
    Alerts,
    /// All users.
    Users,
    /// The settings singleton.
    Settings,
}

impl CacheKey {
    /// Every key the cache knows about.
    pub const ALL: [Self; 4] = [Self::Services, Self::Alerts, Self::Users, Self::Settings];

    /// Returns the key as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Services => "services",
            Self::Alerts => "alerts",
            Self::Users => "users",
            Self::Settings => "settings",
        }
    }

    /// Returns how this key is kept fresh.
    #[must_use]
    pub const fn policy(&self) -> RefreshPolicy {
        match self {
            Self::Services => RefreshPolicy::Poll,
            Self::Alerts | Self::Users | Self::Settings => RefreshPolicy::OnDemand,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness policy of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Fetched on first subscription and on invalidation.
    OnDemand,
    /// Also re-fetched periodically while subscribed.
    Poll,
}

/// Fetch status of a cache entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Never fetched.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed. Earlier data, if any, is still readable.
    Error,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Cached payload of an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheData {
    /// Services collection.
    Services(Arc<Vec<Service>>),
    /// Alerts collection.
    Alerts(Arc<Vec<Alert>>),
    /// Users collection.
    Users(Arc<Vec<User>>),
    /// Settings singleton.
    Settings(Arc<Settings>),
}

impl CacheData {
    /// Returns the key this payload belongs under.
    #[must_use]
    pub const fn key(&self) -> CacheKey {
        match self {
            Self::Services(_) => CacheKey::Services,
            Self::Alerts(_) => CacheKey::Alerts,
            Self::Users(_) => CacheKey::Users,
            Self::Settings(_) => CacheKey::Settings,
        }
    }
}

/// Metadata of a cache entry, without the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryState {
    /// Fetch status.
    pub status: FetchStatus,
    /// Data has been invalidated and not re-fetched yet.
    pub stale: bool,
    /// Generation of the most recently started fetch.
    pub generation: u64,
    /// A fetch of the current generation is outstanding.
    pub in_flight: bool,
    /// When data was last successfully fetched.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Error from the last fetch, if it failed.
    pub error: Option<ClientError>,
    /// Failed fetches since the last success.
    pub consecutive_failures: u32,
    /// Live subscriptions.
    pub subscribers: usize,
}

impl EntryState {
    /// Returns `true` once a fetch has settled, either way.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.in_flight && matches!(self.status, FetchStatus::Ready | FetchStatus::Error)
    }
}

/// A typed read of one entry.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    /// The cached data, if any fetch ever succeeded.
    pub data: Option<T>,
    /// Entry metadata.
    pub state: EntryState,
}

impl<T> Snapshot<T> {
    /// Returns `true` if data is present but the last fetch failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.data.is_some() && self.state.status == FetchStatus::Error
    }
}

/// A state change observed by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A fetch started.
    Loading {
        /// Affected key.
        key: CacheKey,
        /// Generation of the new fetch.
        generation: u64,
    },
    /// A fetch succeeded and its data was stored.
    Ready {
        /// Affected key.
        key: CacheKey,
        /// Generation that produced the data.
        generation: u64,
    },
    /// A fetch failed; previous data was kept.
    Failed {
        /// Affected key.
        key: CacheKey,
        /// Generation that failed.
        generation: u64,
        /// The failure.
        error: ClientError,
    },
    /// A response arrived for a superseded generation and was dropped.
    Discarded {
        /// Affected key.
        key: CacheKey,
        /// The superseded generation.
        generation: u64,
    },
    /// The key was marked stale.
    Invalidated {
        /// Affected key.
        key: CacheKey,
    },
    /// A server-confirmed entity was patched into the cached data.
    Patched {
        /// Affected key.
        key: CacheKey,
    },
    /// All entries were dropped.
    Cleared,
}

impl CacheEvent {
    /// Returns the key the event concerns, or `None` for cache-wide events.
    #[must_use]
    pub const fn key(&self) -> Option<CacheKey> {
        match self {
            Self::Loading { key, .. }
            | Self::Ready { key, .. }
            | Self::Failed { key, .. }
            | Self::Discarded { key, .. }
            | Self::Invalidated { key }
            | Self::Patched { key } => Some(*key),
            Self::Cleared => None,
        }
    }
}

/// How a fetch request interacts with one already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    /// Queue exactly one follow-up fetch.
    Coalesce,
    /// Start a new generation; the in-flight response will be discarded.
    Supersede,
    /// Do nothing; the in-flight fetch is recent enough.
    SkipIfBusy,
}

#[derive(Debug, Default)]
struct Entry {
    data: Option<CacheData>,
    state: EntryState,
    refetch_pending: bool,
    poller: Option<JoinHandle<()>>,
}

struct Shared<R> {
    repo: R,
    config: CacheConfig,
    entries: Mutex<HashMap<CacheKey, Entry>>,
    events: broadcast::Sender<CacheEvent>,
}

/// Keyed, subscription-driven cache of server-owned collections.
///
/// Cloning is cheap; clones share the same entries.
pub struct SyncCache<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for SyncCache<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> fmt::Debug for SyncCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCache")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl<R: Repository> SyncCache<R> {
    /// Create a cache with default configuration.
    #[must_use]
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, CacheConfig::default())
    }

    /// Create a cache with custom configuration.
    #[must_use]
    pub fn with_config(repo: R, config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let entries = CacheKey::ALL
            .into_iter()
            .map(|key| (key, Entry::default()))
            .collect();
        Self {
            shared: Arc::new(Shared {
                repo,
                config,
                entries: Mutex::new(entries),
                events,
            }),
        }
    }

    /// Returns the repository the cache fetches through.
    #[must_use]
    pub fn repository(&self) -> &R {
        &self.shared.repo
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Receive every cache event, for all keys.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
        self.shared.events.subscribe()
    }

    /// Subscribe to a key.
    ///
    /// Triggers a fetch if the key has no data or is stale, and starts the
    /// poll timer for polled keys. Dropping the returned [`Subscription`]
    /// releases it. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn subscribe(&self, key: CacheKey) -> Subscription<R> {
        let events = self.shared.events.subscribe();
        let started = {
            let mut entries = self.shared.entries.lock();
            let entry = entries.entry(key).or_default();
            entry.state.subscribers += 1;

            if entry.state.subscribers == 1 && key.policy() == RefreshPolicy::Poll {
                entry.poller = Some(self.spawn_poller(key));
            }
            debug!(key = %key, subscribers = entry.state.subscribers, "subscribed");

            // An in-flight fetch already covers this subscriber; a pending
            // invalidation is replayed when it settles.
            if !entry.state.in_flight && (entry.data.is_none() || entry.state.stale) {
                Self::begin_fetch(key, entry, FetchMode::Coalesce)
            } else {
                None
            }
        };

        if let Some(generation) = started {
            self.spawn_fetch(key, generation);
        }

        Subscription {
            cache: self.clone(),
            key,
            events,
        }
    }

    /// Mark a key stale.
    ///
    /// If the key has subscribers a fetch starts immediately, or, when one
    /// is already in flight, exactly one follow-up fetch is queued behind it.
    /// Without subscribers the next subscription fetches. A response already
    /// in flight never clears the stale mark set here.
    pub fn invalidate(&self, key: CacheKey) {
        let (subscribed, started) = {
            let mut entries = self.shared.entries.lock();
            let entry = entries.entry(key).or_default();
            entry.state.stale = true;
            if entry.state.in_flight {
                entry.refetch_pending = true;
            }
            let subscribed = entry.state.subscribers > 0;
            let started = if subscribed {
                Self::begin_fetch(key, entry, FetchMode::Coalesce)
            } else {
                None
            };
            (subscribed, started)
        };
        debug!(key = %key, subscribed, "invalidated");
        self.emit(CacheEvent::Invalidated { key });

        if let Some(generation) = started {
            self.spawn_fetch(key, generation);
        }
    }

    /// Start a fetch now, superseding any fetch in flight.
    ///
    /// Returns the generation of the new fetch.
    pub fn refetch(&self, key: CacheKey) -> u64 {
        self.request_fetch(key, FetchMode::Supersede)
            .unwrap_or_else(|| self.state(key).generation)
    }

    /// Drop all cached data and supersede every in-flight fetch.
    ///
    /// Subscriptions stay registered. Keys that still have subscribers are
    /// re-fetched right away; the rest stay empty until subscribed again.
    pub fn clear(&self) {
        let started: Vec<(CacheKey, u64)> = {
            let mut entries = self.shared.entries.lock();
            entries
                .iter_mut()
                .filter_map(|(key, entry)| {
                    entry.data = None;
                    entry.refetch_pending = false;
                    entry.state = EntryState {
                        generation: entry.state.generation + 1,
                        subscribers: entry.state.subscribers,
                        ..EntryState::default()
                    };
                    if entry.state.subscribers == 0 {
                        return None;
                    }
                    Self::begin_fetch(*key, entry, FetchMode::Supersede)
                        .map(|generation| (*key, generation))
                })
                .collect()
        };
        info!(refetching = started.len(), "cache cleared");
        self.emit(CacheEvent::Cleared);

        for (key, generation) in started {
            self.spawn_fetch(key, generation);
        }
    }

    /// Returns the metadata of a key.
    #[must_use]
    pub fn state(&self, key: CacheKey) -> EntryState {
        self.shared
            .entries
            .lock()
            .get(&key)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Returns the raw payload and metadata of a key.
    #[must_use]
    pub fn snapshot(&self, key: CacheKey) -> Snapshot<CacheData> {
        self.read(key, |data| Some(data.clone()))
    }

    /// Typed read of the services collection.
    #[must_use]
    pub fn services(&self) -> Snapshot<Arc<Vec<Service>>> {
        self.read(CacheKey::Services, |data| match data {
            CacheData::Services(services) => Some(Arc::clone(services)),
            _ => None,
        })
    }

    /// Typed read of the alerts collection.
    #[must_use]
    pub fn alerts(&self) -> Snapshot<Arc<Vec<Alert>>> {
        self.read(CacheKey::Alerts, |data| match data {
            CacheData::Alerts(alerts) => Some(Arc::clone(alerts)),
            _ => None,
        })
    }

    /// Typed read of the users collection.
    #[must_use]
    pub fn users(&self) -> Snapshot<Arc<Vec<User>>> {
        self.read(CacheKey::Users, |data| match data {
            CacheData::Users(users) => Some(Arc::clone(users)),
            _ => None,
        })
    }

    /// Typed read of the settings singleton.
    #[must_use]
    pub fn settings(&self) -> Snapshot<Arc<Settings>> {
        self.read(CacheKey::Settings, |data| match data {
            CacheData::Settings(settings) => Some(Arc::clone(settings)),
            _ => None,
        })
    }

    /// Apply `patch` to the cached data of `key`, if any.
    ///
    /// Only used with server-confirmed entities. Returns `true` if data was
    /// present and patched.
    pub(crate) fn patch(&self, key: CacheKey, patch: impl FnOnce(&mut CacheData)) -> bool {
        let patched = {
            let mut entries = self.shared.entries.lock();
            match entries.get_mut(&key).and_then(|entry| entry.data.as_mut()) {
                Some(data) => {
                    patch(data);
                    true
                }
                None => false,
            }
        };
        if patched {
            trace!(key = %key, "patched cached data");
            self.emit(CacheEvent::Patched { key });
        }
        patched
    }

    fn read<T>(&self, key: CacheKey, extract: impl FnOnce(&CacheData) -> Option<T>) -> Snapshot<T> {
        let entries = self.shared.entries.lock();
        entries.get(&key).map_or_else(
            || Snapshot {
                data: None,
                state: EntryState::default(),
            },
            |entry| Snapshot {
                data: entry.data.as_ref().and_then(extract),
                state: entry.state.clone(),
            },
        )
    }

    fn emit(&self, event: CacheEvent) {
        // No receivers is fine.
        let _ = self.shared.events.send(event);
    }

    /// Start a fetch according to `mode`. Returns the new generation, or
    /// `None` if no fetch was started.
    fn request_fetch(&self, key: CacheKey, mode: FetchMode) -> Option<u64> {
        let generation = {
            let mut entries = self.shared.entries.lock();
            Self::begin_fetch(key, entries.entry(key).or_default(), mode)
        }?;
        self.spawn_fetch(key, generation);
        Some(generation)
    }

    /// Claim a new generation on `entry` according to `mode`.
    ///
    /// Runs under the entries lock, so the decision and the claim cannot be
    /// split by a concurrent request. The caller spawns the fetch with
    /// [`Self::spawn_fetch`] once the lock is released.
    fn begin_fetch(key: CacheKey, entry: &mut Entry, mode: FetchMode) -> Option<u64> {
        if entry.state.in_flight {
            match mode {
                FetchMode::SkipIfBusy => {
                    trace!(key = %key, "fetch in flight, skipping");
                    return None;
                }
                FetchMode::Coalesce => {
                    entry.refetch_pending = true;
                    trace!(key = %key, generation = entry.state.generation, "fetch in flight, follow-up queued");
                    return None;
                }
                FetchMode::Supersede => {
                    debug!(key = %key, generation = entry.state.generation, "superseding in-flight fetch");
                }
            }
        }
        entry.state.generation += 1;
        entry.state.in_flight = true;
        entry.state.status = FetchStatus::Loading;
        entry.refetch_pending = false;
        Some(entry.state.generation)
    }

    fn spawn_fetch(&self, key: CacheKey, generation: u64) {
        self.emit(CacheEvent::Loading { key, generation });

        let cache = self.clone();
        tokio::spawn(async move {
            let result = cache.load(key).await;
            cache.complete(key, generation, result);
        });
    }

    async fn load(&self, key: CacheKey) -> Result<CacheData> {
        let repo = &self.shared.repo;
        match key {
            CacheKey::Services => repo
                .list_services()
                .await
                .map(|services| CacheData::Services(Arc::new(services))),
            CacheKey::Alerts => repo
                .list_alerts()
                .await
                .map(|alerts| CacheData::Alerts(Arc::new(alerts))),
            CacheKey::Users => repo
                .list_users()
                .await
                .map(|users| CacheData::Users(Arc::new(users))),
            CacheKey::Settings => repo
                .get_settings()
                .await
                .map(|settings| CacheData::Settings(Arc::new(settings))),
        }
    }

    fn complete(&self, key: CacheKey, generation: u64, result: Result<CacheData>) {
        let (event, follow_up) = {
            let mut entries = self.shared.entries.lock();
            let entry = entries.entry(key).or_default();

            if entry.state.generation != generation {
                debug!(
                    key = %key,
                    generation,
                    current = entry.state.generation,
                    "discarding superseded response"
                );
                (CacheEvent::Discarded { key, generation }, None)
            } else {
                entry.state.in_flight = false;
                let event = match result {
                    Ok(data) => {
                        entry.data = Some(data);
                        entry.state.status = FetchStatus::Ready;
                        entry.state.last_fetched_at = Some(Utc::now());
                        entry.state.error = None;
                        entry.state.consecutive_failures = 0;
                        entry.state.stale = entry.refetch_pending;
                        trace!(key = %key, generation, "fetch succeeded");
                        CacheEvent::Ready { key, generation }
                    }
                    Err(error) => {
                        entry.state.status = FetchStatus::Error;
                        entry.state.error = Some(error.clone());
                        entry.state.consecutive_failures += 1;
                        if entry.data.is_some() {
                            warn!(
                                key = %key,
                                generation,
                                failures = entry.state.consecutive_failures,
                                error = %error,
                                "refresh failed, keeping previous data"
                            );
                        } else {
                            warn!(key = %key, generation, error = %error, "initial fetch failed");
                        }
                        CacheEvent::Failed {
                            key,
                            generation,
                            error,
                        }
                    }
                };

                let follow_up = if entry.refetch_pending && entry.state.subscribers > 0 {
                    Self::begin_fetch(key, entry, FetchMode::Coalesce)
                } else {
                    if entry.refetch_pending {
                        entry.state.stale = true;
                    }
                    None
                };
                entry.refetch_pending = false;
                (event, follow_up)
            }
        };

        self.emit(event);
        if let Some(generation) = follow_up {
            self.spawn_fetch(key, generation);
        }
    }

    fn spawn_poller(&self, key: CacheKey) -> JoinHandle<()> {
        let weak: Weak<Shared<R>> = Arc::downgrade(&self.shared);
        let period = self
            .shared
            .config
            .services_poll_interval
            .max(Duration::from_millis(1));
        debug!(key = %key, period = ?period, "starting poll timer");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; subscribe already fetched.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let cache = SyncCache { shared };
                trace!(key = %key, "poll tick");
                cache.request_fetch(key, FetchMode::SkipIfBusy);
            }
        })
    }

    fn release(&self, key: CacheKey) {
        let mut entries = self.shared.entries.lock();
        if let Some(entry) = entries.get_mut(&key) {
            entry.state.subscribers = entry.state.subscribers.saturating_sub(1);
            if entry.state.subscribers == 0 {
                if let Some(poller) = entry.poller.take() {
                    poller.abort();
                    debug!(key = %key, "poll timer stopped");
                }
            }
            debug!(key = %key, subscribers = entry.state.subscribers, "unsubscribed");
        }
    }
}

/// A live interest in one cache key.
///
/// Keeps polled keys polling while alive. Dropping it unsubscribes; an
/// in-flight fetch is not aborted and its result is still stored.
pub struct Subscription<R: Repository> {
    cache: SyncCache<R>,
    key: CacheKey,
    events: broadcast::Receiver<CacheEvent>,
}

impl<R: Repository> fmt::Debug for Subscription<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<R: Repository> Subscription<R> {
    /// Returns the subscribed key.
    #[must_use]
    pub const fn key(&self) -> CacheKey {
        self.key
    }

    /// Returns the cache this subscription belongs to.
    #[must_use]
    pub const fn cache(&self) -> &SyncCache<R> {
        &self.cache
    }

    /// Returns the current metadata of the key.
    #[must_use]
    pub fn state(&self) -> EntryState {
        self.cache.state(self.key)
    }

    /// Wait for the next event concerning this key.
    ///
    /// Cache-wide events such as [`CacheEvent::Cleared`] are delivered too.
    /// Returns `None` if events were missed because the subscriber lagged;
    /// re-read [`Subscription::state`] in that case.
    pub async fn next_event(&mut self) -> Option<CacheEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) if event.key().is_none_or(|key| key == self.key) => {
                    return Some(event);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(key = %self.key, missed, "subscriber lagged");
                    return None;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until the key's metadata satisfies `predicate`.
    pub async fn wait_for(&mut self, predicate: impl Fn(&EntryState) -> bool) -> EntryState {
        loop {
            let state = self.state();
            if predicate(&state) {
                return state;
            }
            match self.events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.state(),
            }
        }
    }

    /// Wait until no fetch is outstanding and the last one has settled.
    pub async fn settled(&mut self) -> EntryState {
        self.wait_for(EntryState::is_settled).await
    }
}

impl<R: Repository> Drop for Subscription<R> {
    fn drop(&mut self) {
        self.cache.release(self.key);
    }
}
