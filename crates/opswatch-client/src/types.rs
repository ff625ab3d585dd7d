//! Entity types mirrored from the Opswatch REST API.
//!
//! The cache only ever holds read projections of these entities; the backend
//! owns them. Write payloads ([`NewService`], [`ServicePatch`], [`NewUser`],
//! [`UserPatch`]) are separate types so that server-assigned fields such as
//! `id` and the timestamps can never be sent by the client.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Health of a monitored service as last observed by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// The last health check succeeded.
    #[default]
    Up,
    /// The last health check failed.
    Down,
}

impl ServiceStatus {
    /// Returns the status as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of health check a service is registered with.
///
/// The wire format is a free string; unknown kinds are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// HTTP(S) request check.
    Http,
    /// Plain TCP connect check.
    Tcp,
    /// ICMP ping check.
    Icmp,
    /// Operator-supplied script.
    Custom,
    /// Any kind this client does not know about.
    Other(String),
}

impl ServiceKind {
    /// Parses a kind from its wire string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "http" | "https" => Self::Http,
            "tcp" => Self::Tcp,
            "icmp" | "ping" => Self::Icmp,
            "custom" => Self::Custom,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Returns the kind as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "http",
            Self::Tcp => "tcp",
            Self::Icmp => "icmp",
            Self::Custom => "custom",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Server-assigned identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Check kind as sent by the backend (see [`Service::kind`]).
    #[serde(rename = "type")]
    pub service_type: String,
    /// Target URL or host.
    pub url: String,
    /// Opaque check configuration, expected to be JSON text.
    #[serde(default)]
    pub config: String,
    /// Last observed health.
    #[serde(default)]
    pub status: ServiceStatus,
    /// When the service was registered.
    pub created_at: DateTime<Utc>,
    /// Time of the last health check. Only the backend advances this.
    pub updated_at: DateTime<Utc>,
}

impl Service {
    /// Returns the typed check kind.
    #[must_use]
    pub fn kind(&self) -> ServiceKind {
        ServiceKind::parse(&self.service_type)
    }

    /// Parses the opaque `config` string into a [`CheckConfig`].
    ///
    /// An empty string parses as the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] if the string is not valid JSON for
    /// a check configuration.
    pub fn check_config(&self) -> Result<CheckConfig> {
        if self.config.trim().is_empty() {
            return Ok(CheckConfig::default());
        }
        serde_json::from_str(&self.config).map_err(ClientError::from)
    }
}

/// Structured view of a service's check configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    /// HTTP method for HTTP checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Expected HTTP status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    /// Check timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    /// Per-service check interval in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<u32>,
    /// Retries before a check counts as failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    /// Consecutive successes needed to mark the service up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
    /// Consecutive failures needed to mark the service down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    /// Script body for custom checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_script: Option<String>,
}

/// Payload for registering a new service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    /// Display name.
    pub name: String,
    /// Check kind.
    #[serde(rename = "type")]
    pub service_type: String,
    /// Target URL or host.
    pub url: String,
    /// Opaque check configuration.
    pub config: String,
    /// Initial status. New services start out `up`.
    pub status: ServiceStatus,
}

impl NewService {
    /// Creates a payload with an empty config and `up` status.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        service_type: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            url: url.into(),
            config: String::new(),
            status: ServiceStatus::Up,
        }
    }

    /// Sets the opaque config string.
    #[must_use]
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    /// Checks that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("type", &self.service_type)?;
        require("url", &self.url)
    }
}

/// Partial update for a service. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New check kind.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    /// New target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// New opaque config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

impl ServicePatch {
    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.service_type.is_none()
            && self.url.is_none()
            && self.config.is_none()
    }
}

/// Lifecycle status of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// The underlying problem is ongoing.
    Active,
    /// An operator resolved the alert.
    Resolved,
}

impl AlertStatus {
    /// Returns the status as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an operator has acknowledged an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Not yet acknowledged.
    Pending,
    /// Acknowledged by an operator.
    Verified,
}

impl VerificationStatus {
    /// Returns the status as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert raised by the backend against a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Server-assigned identifier.
    pub id: i64,
    /// The service this alert was raised against.
    pub service_id: i64,
    /// Service name at the time the alert was raised.
    #[serde(default)]
    pub service_name: String,
    /// Active or resolved.
    pub status: AlertStatus,
    /// Pending or verified.
    pub verification_status: VerificationStatus,
    /// When the problem started.
    pub started_at: DateTime<Utc>,
    /// When the alert was resolved. Set iff `status` is resolved.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Returns `true` if the alert is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Returns `true` if `resolved_at` is set exactly when the alert is resolved.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.resolved_at.is_some() == (self.status == AlertStatus::Resolved)
    }
}

/// User identifier. The API has served both numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    /// Numeric id.
    Int(i64),
    /// String id.
    Str(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        id.parse::<i64>().map_or_else(|_| Self::Str(id.to_string()), Self::Int)
    }
}

/// An operator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Phone number for SMS/voice escalation.
    #[serde(default)]
    pub phone: String,
    /// Free-form role.
    #[serde(default)]
    pub role: String,
    /// Creation time.
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Last modification time, when the backend reports it.
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Returns `true` for accounts with the `admin` role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}

/// Payload for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
    /// Role.
    pub role: String,
}

impl NewUser {
    /// Checks that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("email", &self.email)?;
        require("phone", &self.phone)?;
        require("role", &self.role)
    }
}

/// Partial update for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New phone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// New role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Process-wide dashboard settings. Replaced wholesale on save.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Health-check interval in seconds.
    pub check_interval: u32,
    /// Consecutive failures before an alert is raised.
    pub alert_threshold: u32,
    /// Master switch for notifications.
    pub enable_notifications: bool,
    /// Email notifications.
    pub enable_email_alerts: bool,
    /// SMS notifications.
    #[serde(rename = "enableSMSAlerts")]
    pub enable_sms_alerts: bool,
    /// SMTP host.
    pub smtp_server: String,
    /// SMTP port.
    pub smtp_port: u16,
    /// SMTP user.
    pub smtp_username: String,
    /// SMTP password.
    pub smtp_password: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval: 300,
            alert_threshold: 3,
            enable_notifications: true,
            enable_email_alerts: true,
            enable_sms_alerts: true,
            smtp_server: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("check_interval", &self.check_interval)
            .field("alert_threshold", &self.alert_threshold)
            .field("enable_notifications", &self.enable_notifications)
            .field("enable_email_alerts", &self.enable_email_alerts)
            .field("enable_sms_alerts", &self.enable_sms_alerts)
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"<redacted>")
            .finish()
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ClientError::Validation(format!("{field} is required")));
    }
    Ok(())
}
