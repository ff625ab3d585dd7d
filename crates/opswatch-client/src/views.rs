//! Derived views over cached collections.
//!
//! Everything here is pure and recomputed from the current cache contents on
//! every render; collections are small enough that no incremental
//! maintenance is needed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Alert, AlertStatus, Service, ServiceStatus};

/// Up/down counters over the services collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct HealthCounters {
    /// Services whose last check succeeded.
    pub up: usize,
    /// Services whose last check failed.
    pub down: usize,
    /// Total services.
    pub total: usize,
    /// Share of services that are down, in percent.
    pub down_pct: f64,
}

impl HealthCounters {
    /// Compute counters for a collection.
    #[must_use]
    pub fn from_services(services: &[Service]) -> Self {
        let up = services
            .iter()
            .filter(|s| s.status == ServiceStatus::Up)
            .count();
        let down = services
            .iter()
            .filter(|s| s.status == ServiceStatus::Down)
            .count();
        let total = services.len();
        let down_pct = down as f64 / total.max(1) as f64 * 100.0;

        Self {
            up,
            down,
            total,
            down_pct,
        }
    }
}

/// Alerts split by lifecycle status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPartition {
    /// Alerts with status `active`.
    pub active: Vec<Alert>,
    /// Alerts with status `resolved`.
    pub resolved: Vec<Alert>,
}

impl AlertPartition {
    /// Partition a collection. Every alert lands in exactly one half.
    #[must_use]
    pub fn from_alerts(alerts: &[Alert]) -> Self {
        let (active, resolved) = alerts
            .iter()
            .cloned()
            .partition(|a| a.status == AlertStatus::Active);
        Self { active, resolved }
    }
}

/// Dashboard summary combining service health and open alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Service health counters.
    pub health: HealthCounters,
    /// Number of active alerts.
    pub active_alerts: usize,
    /// Active alerts, most recently started first.
    pub recent_alerts: Vec<Alert>,
}

impl Overview {
    /// Build the summary from the two collections.
    #[must_use]
    pub fn compute(services: &[Service], alerts: &[Alert]) -> Self {
        let mut recent_alerts = AlertPartition::from_alerts(alerts).active;
        recent_alerts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Self {
            health: HealthCounters::from_services(services),
            active_alerts: recent_alerts.len(),
            recent_alerts,
        }
    }
}

/// Returns the items whose fields contain `query`, ignoring case.
///
/// Each entity is matched against the string form of every one of its
/// serialized fields. An empty query matches everything.
#[must_use]
pub fn search<'a, T: Serialize>(items: &'a [T], query: &str) -> Vec<&'a T> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return items.iter().collect();
    }
    items.iter().filter(|item| matches(*item, &needle)).collect()
}

fn matches<T: Serialize>(item: &T, needle: &str) -> bool {
    match serde_json::to_value(item) {
        Ok(Value::Object(fields)) => fields
            .values()
            .any(|field| field_text(field).to_lowercase().contains(needle)),
        Ok(other) => field_text(&other).to_lowercase().contains(needle),
        Err(_) => false,
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
