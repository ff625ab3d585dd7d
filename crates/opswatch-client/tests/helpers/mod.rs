//! Test helpers for cache and mutation tests.
//!
//! [`MockRepository`] is an in-memory backend. Each call is counted, reads a
//! snapshot of the backend state when it starts, and can be held open with a
//! gate or made to fail, so tests control exactly when and how responses
//! land.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use opswatch_client::{
    Alert, AlertStatus, ClientError, EntryState, NewService, NewUser, Repository, Result, Service,
    ServicePatch, ServiceStatus, Settings, Subscription, User, UserId, UserPatch,
    VerificationStatus,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Default test timeout.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed timestamp used for fixtures.
pub fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 22, 10, 30, 0).unwrap()
}

pub fn service(id: i64, name: &str, status: ServiceStatus) -> Service {
    Service {
        id,
        name: name.to_string(),
        service_type: "http".to_string(),
        url: format!("https://{name}.example.com"),
        config: String::new(),
        status,
        created_at: ts(),
        updated_at: ts(),
    }
}

pub fn alert(id: i64, service_id: i64, status: AlertStatus) -> Alert {
    Alert {
        id,
        service_id,
        service_name: format!("svc-{service_id}"),
        status,
        verification_status: VerificationStatus::Pending,
        started_at: ts(),
        resolved_at: (status == AlertStatus::Resolved).then(ts),
        created_at: ts(),
        updated_at: ts(),
    }
}

pub fn user(id: impl Into<UserId>, name: &str, role: &str) -> User {
    User {
        id: id.into(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: "+15550100".to_string(),
        role: role.to_string(),
        created_at: ts(),
        updated_at: None,
    }
}

/// Backend contents.
#[derive(Debug, Clone, Default)]
pub struct Backend {
    pub services: Vec<Service>,
    pub alerts: Vec<Alert>,
    pub users: Vec<User>,
    pub settings: Settings,
    pub next_id: i64,
}

#[derive(Default)]
struct Inner {
    backend: Mutex<Backend>,
    calls: Mutex<HashMap<&'static str, usize>>,
    gates: Mutex<HashMap<&'static str, VecDeque<oneshot::Receiver<()>>>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ClientError>>>,
}

/// Scriptable in-memory [`Repository`]. Clones share state.
#[derive(Clone, Default)]
pub struct MockRepository {
    inner: Arc<Inner>,
}

impl MockRepository {
    pub fn new(backend: Backend) -> Self {
        let repo = Self::default();
        *repo.inner.backend.lock() = Backend {
            next_id: backend.next_id.max(100),
            ..backend
        };
        repo
    }

    /// Number of times `op` was called.
    pub fn calls(&self, op: &str) -> usize {
        self.inner.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// Hold the next call to `op` open until the returned sender fires or
    /// is dropped.
    pub fn gate(&self, op: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.gates.lock().entry(op).or_default().push_back(rx);
        tx
    }

    /// Make the next call to `op` fail with `error`.
    pub fn fail_next(&self, op: &'static str, error: ClientError) {
        self.inner
            .failures
            .lock()
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Mutate the backend directly, as another operator would.
    pub fn with_backend<T>(&self, f: impl FnOnce(&mut Backend) -> T) -> T {
        f(&mut self.inner.backend.lock())
    }

    async fn enter(&self, op: &'static str) -> Result<Backend> {
        *self.inner.calls.lock().entry(op).or_default() += 1;
        let snapshot = self.inner.backend.lock().clone();
        let gate = self.inner.gates.lock().get_mut(op).and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.inner.failures.lock().get_mut(op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(snapshot),
        }
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> ClientError {
    ClientError::api(404, format!("{what} {id} not found"))
}

impl Repository for MockRepository {
    async fn list_services(&self) -> Result<Vec<Service>> {
        self.enter("list_services").await.map(|b| b.services)
    }

    async fn create_service(&self, new: &NewService) -> Result<Service> {
        self.enter("create_service").await?;
        Ok(self.with_backend(|b| {
            b.next_id += 1;
            let created = Service {
                id: b.next_id,
                name: new.name.clone(),
                service_type: new.service_type.clone(),
                url: new.url.clone(),
                config: new.config.clone(),
                status: new.status,
                created_at: ts(),
                updated_at: ts(),
            };
            b.services.push(created.clone());
            created
        }))
    }

    async fn update_service(&self, id: i64, patch: &ServicePatch) -> Result<Service> {
        self.enter("update_service").await?;
        self.with_backend(|b| {
            let service = b
                .services
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| not_found("service", id))?;
            if let Some(name) = &patch.name {
                service.name.clone_from(name);
            }
            if let Some(service_type) = &patch.service_type {
                service.service_type.clone_from(service_type);
            }
            if let Some(url) = &patch.url {
                service.url.clone_from(url);
            }
            if let Some(config) = &patch.config {
                service.config.clone_from(config);
            }
            Ok(service.clone())
        })
    }

    async fn delete_service(&self, id: i64) -> Result<()> {
        self.enter("delete_service").await?;
        self.with_backend(|b| {
            let before = b.services.len();
            b.services.retain(|s| s.id != id);
            if b.services.len() == before {
                return Err(not_found("service", id));
            }
            b.alerts.retain(|a| a.service_id != id);
            Ok(())
        })
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        self.enter("list_alerts").await.map(|b| b.alerts)
    }

    async fn resolve_alert(&self, id: i64) -> Result<Alert> {
        self.enter("resolve_alert").await?;
        self.with_backend(|b| {
            let alert = b
                .alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| not_found("alert", id))?;
            if alert.status == AlertStatus::Resolved {
                return Err(ClientError::api(409, "alert already resolved"));
            }
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(ts());
            Ok(alert.clone())
        })
    }

    async fn verify_alert(&self, id: i64) -> Result<Alert> {
        self.enter("verify_alert").await?;
        self.with_backend(|b| {
            let alert = b
                .alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| not_found("alert", id))?;
            alert.verification_status = VerificationStatus::Verified;
            Ok(alert.clone())
        })
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.enter("list_users").await.map(|b| b.users)
    }

    async fn create_user(&self, new: &NewUser) -> Result<User> {
        self.enter("create_user").await?;
        Ok(self.with_backend(|b| {
            b.next_id += 1;
            let created = User {
                id: UserId::Int(b.next_id),
                name: new.name.clone(),
                email: new.email.clone(),
                phone: new.phone.clone(),
                role: new.role.clone(),
                created_at: ts(),
                updated_at: None,
            };
            b.users.push(created.clone());
            created
        }))
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User> {
        self.enter("update_user").await?;
        self.with_backend(|b| {
            let user = b
                .users
                .iter_mut()
                .find(|u| u.id == *id)
                .ok_or_else(|| not_found("user", id))?;
            if let Some(name) = &patch.name {
                user.name.clone_from(name);
            }
            if let Some(email) = &patch.email {
                user.email.clone_from(email);
            }
            if let Some(phone) = &patch.phone {
                user.phone.clone_from(phone);
            }
            if let Some(role) = &patch.role {
                user.role.clone_from(role);
            }
            user.updated_at = Some(ts());
            Ok(user.clone())
        })
    }

    async fn delete_user(&self, id: &UserId) -> Result<()> {
        self.enter("delete_user").await?;
        self.with_backend(|b| {
            let before = b.users.len();
            b.users.retain(|u| u.id != *id);
            if b.users.len() == before {
                return Err(not_found("user", id));
            }
            Ok(())
        })
    }

    async fn get_settings(&self) -> Result<Settings> {
        self.enter("get_settings").await.map(|b| b.settings)
    }

    async fn save_settings(&self, settings: &Settings) -> Result<Settings> {
        self.enter("save_settings").await?;
        Ok(self.with_backend(|b| {
            b.settings = settings.clone();
            b.settings.clone()
        }))
    }
}

/// Wait until the subscribed key satisfies `predicate`, failing the test
/// after [`TEST_TIMEOUT`].
pub async fn wait_until(
    sub: &mut Subscription<MockRepository>,
    predicate: impl Fn(&EntryState) -> bool,
) -> EntryState {
    tokio::time::timeout(TEST_TIMEOUT, sub.wait_for(predicate))
        .await
        .expect("timed out waiting for cache state")
}

/// Wait until the key has fresh data and nothing in flight.
pub async fn wait_fresh(sub: &mut Subscription<MockRepository>) -> EntryState {
    wait_until(sub, |s| s.is_settled() && !s.stale).await
}

/// Let spawned tasks run.
pub async fn settle_tasks() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
