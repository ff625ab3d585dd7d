//! # opswatch-client
//!
//! Client-side state synchronization for the Opswatch operations dashboard.
//!
//! The backend owns all data. This crate keeps a local, subscription-driven
//! copy of the four server collections and routes operator writes back to
//! the server:
//!
//! - **Repository**: typed REST access to services, alerts, users and
//!   settings ([`Repository`], [`HttpRepository`])
//! - **Sync cache**: keyed entries with polling, invalidation coalescing and
//!   stale-while-revalidate ([`SyncCache`])
//! - **Mutations**: server-confirmed writes followed by invalidation of the
//!   affected keys ([`MutationPipeline`])
//! - **Alert lifecycle**: resolve/verify preconditions ([`lifecycle`])
//! - **Views**: health counters, alert partition and search ([`views`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use opswatch_client::{CacheKey, ClientConfig, HttpRepository, MutationPipeline, SyncCache};
//! use opswatch_client::views::HealthCounters;
//!
//! #[tokio::main]
//! async fn main() -> opswatch_client::Result<()> {
//!     let repo = HttpRepository::new(&ClientConfig::default())?;
//!     let cache = SyncCache::new(repo);
//!
//!     let mut services = cache.subscribe(CacheKey::Services);
//!     services.settled().await;
//!     if let Some(list) = cache.services().data {
//!         let health = HealthCounters::from_services(&list);
//!         println!("{} up, {} down", health.up, health.down);
//!     }
//!
//!     let pipeline = MutationPipeline::new(cache.clone());
//!     pipeline.delete_service(3).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mutation;
pub mod repository;
pub mod types;
pub mod views;

// Re-export main types
pub use cache::{
    CacheData, CacheEvent, CacheKey, EntryState, FetchStatus, RefreshPolicy, Snapshot,
    Subscription, SyncCache,
};
pub use config::{CacheConfig, ClientConfig};
pub use error::{ClientError, Result};
pub use lifecycle::{AlertAction, AlertState};
pub use mutation::{Mutation, MutationOutcome, MutationPipeline};
pub use repository::{HttpRepository, Repository};
pub use types::{
    Alert, AlertStatus, CheckConfig, NewService, NewUser, Service, ServiceKind, ServicePatch,
    ServiceStatus, Settings, User, UserId, UserPatch, VerificationStatus,
};
