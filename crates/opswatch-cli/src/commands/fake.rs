//! In-memory repository for command tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use opswatch_client::{
    Alert, AlertStatus, CacheConfig, ClientError, NewService, NewUser, Repository, Result,
    Service, ServicePatch, ServiceStatus, Settings, SyncCache, User, UserId, UserPatch,
    VerificationStatus,
};
use parking_lot::Mutex;

pub(crate) fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 22, 10, 30, 0).unwrap()
}

#[derive(Debug, Default)]
struct Data {
    services: Vec<Service>,
    alerts: Vec<Alert>,
    users: Vec<User>,
    settings: Settings,
    next_id: i64,
    offline: bool,
}

/// Fake backend with two services, two alerts and two users.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeRepository {
    data: Arc<Mutex<Data>>,
}

impl FakeRepository {
    pub(crate) fn seeded() -> Self {
        let service = |id: i64, name: &str, status: ServiceStatus| Service {
            id,
            name: name.to_string(),
            service_type: "http".into(),
            url: format!("https://{name}.example.com"),
            config: String::new(),
            status,
            created_at: ts(),
            updated_at: ts(),
        };
        let alert = |id: i64, status: AlertStatus| Alert {
            id,
            service_id: 2,
            service_name: "db".into(),
            status,
            verification_status: VerificationStatus::Pending,
            started_at: ts(),
            resolved_at: (status == AlertStatus::Resolved).then(ts),
            created_at: ts(),
            updated_at: ts(),
        };
        let user = |id: UserId, name: &str, role: &str| User {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "+15550100".into(),
            role: role.to_string(),
            created_at: ts(),
            updated_at: None,
        };

        let data = Data {
            services: vec![
                service(1, "api", ServiceStatus::Up),
                service(2, "db", ServiceStatus::Down),
            ],
            alerts: vec![alert(7, AlertStatus::Active), alert(8, AlertStatus::Resolved)],
            users: vec![
                user(UserId::Int(1), "Ada", "admin"),
                user(UserId::Str("u-2".into()), "Grace", "viewer"),
            ],
            settings: Settings::default(),
            next_id: 100,
            offline: false,
        };
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub(crate) fn cache(&self) -> SyncCache<Self> {
        SyncCache::with_config(self.clone(), CacheConfig::default())
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.data.lock().offline = offline;
    }

    fn with<T>(&self, f: impl FnOnce(&mut Data) -> Result<T>) -> Result<T> {
        let mut data = self.data.lock();
        if data.offline {
            return Err(ClientError::Transport("connection refused".into()));
        }
        f(&mut data)
    }
}

fn not_found(id: impl std::fmt::Display) -> ClientError {
    ClientError::api(404, format!("{id} not found"))
}

impl Repository for FakeRepository {
    async fn list_services(&self) -> Result<Vec<Service>> {
        self.with(|d| Ok(d.services.clone()))
    }

    async fn create_service(&self, new: &NewService) -> Result<Service> {
        self.with(|d| {
            d.next_id += 1;
            let service = Service {
                id: d.next_id,
                name: new.name.clone(),
                service_type: new.service_type.clone(),
                url: new.url.clone(),
                config: new.config.clone(),
                status: new.status,
                created_at: ts(),
                updated_at: ts(),
            };
            d.services.push(service.clone());
            Ok(service)
        })
    }

    async fn update_service(&self, id: i64, patch: &ServicePatch) -> Result<Service> {
        self.with(|d| {
            let service = d
                .services
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| not_found(id))?;
            if let Some(name) = &patch.name {
                service.name.clone_from(name);
            }
            if let Some(url) = &patch.url {
                service.url.clone_from(url);
            }
            Ok(service.clone())
        })
    }

    async fn delete_service(&self, id: i64) -> Result<()> {
        self.with(|d| {
            d.services.retain(|s| s.id != id);
            d.alerts.retain(|a| a.service_id != id);
            Ok(())
        })
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        self.with(|d| Ok(d.alerts.clone()))
    }

    async fn resolve_alert(&self, id: i64) -> Result<Alert> {
        self.with(|d| {
            let alert = d
                .alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| not_found(id))?;
            if alert.status == AlertStatus::Resolved {
                return Err(ClientError::api(409, "alert already resolved"));
            }
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(ts());
            Ok(alert.clone())
        })
    }

    async fn verify_alert(&self, id: i64) -> Result<Alert> {
        self.with(|d| {
            let alert = d
                .alerts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| not_found(id))?;
            alert.verification_status = VerificationStatus::Verified;
            Ok(alert.clone())
        })
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.with(|d| Ok(d.users.clone()))
    }

    async fn create_user(&self, new: &NewUser) -> Result<User> {
        self.with(|d| {
            d.next_id += 1;
            let user = User {
                id: UserId::Int(d.next_id),
                name: new.name.clone(),
                email: new.email.clone(),
                phone: new.phone.clone(),
                role: new.role.clone(),
                created_at: ts(),
                updated_at: None,
            };
            d.users.push(user.clone());
            Ok(user)
        })
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User> {
        self.with(|d| {
            let user = d
                .users
                .iter_mut()
                .find(|u| u.id == *id)
                .ok_or_else(|| not_found(id))?;
            if let Some(role) = &patch.role {
                user.role.clone_from(role);
            }
            if let Some(name) = &patch.name {
                user.name.clone_from(name);
            }
            Ok(user.clone())
        })
    }

    async fn delete_user(&self, id: &UserId) -> Result<()> {
        self.with(|d| {
            let before = d.users.len();
            d.users.retain(|u| u.id != *id);
            if d.users.len() == before {
                return Err(not_found(id));
            }
            Ok(())
        })
    }

    async fn get_settings(&self) -> Result<Settings> {
        self.with(|d| Ok(d.settings.clone()))
    }

    async fn save_settings(&self, settings: &Settings) -> Result<Settings> {
        self.with(|d| {
            d.settings = settings.clone();
            Ok(d.settings.clone())
        })
    }
}
