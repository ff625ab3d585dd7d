//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use chrono::{DateTime, Utc};
use opswatch_client::views::{AlertPartition, HealthCounters, Overview};
use opswatch_client::{Alert, EntryState, FetchStatus, Service, Settings, User};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Freshness of a cached collection at render time.
#[derive(Debug, Clone, Serialize)]
pub struct Freshness {
    /// Fetch status.
    pub status: FetchStatus,
    /// When data was last fetched.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Last fetch error, if the data is stale because of it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&EntryState> for Freshness {
    fn from(state: &EntryState) -> Self {
        Self {
            status: state.status,
            last_fetched_at: state.last_fetched_at,
            error: state.error.as_ref().map(ToString::to_string),
        }
    }
}

impl Freshness {
    fn write_note<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if let Some(error) = &self.error {
            writeln!(writer, "! last refresh failed: {error}")?;
        }
        Ok(())
    }
}

/// Dashboard overview.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Counters and open alerts.
    #[serde(flatten)]
    pub overview: Overview,
    /// Freshness of the services collection.
    pub services: Freshness,
    /// Freshness of the alerts collection.
    pub alerts: Freshness,
}

impl TableDisplay for StatusReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let health = &self.overview.health;
        writeln!(writer, "Service Health")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "  Total:          {}", health.total)?;
        writeln!(writer, "  Up:             {}", health.up)?;
        writeln!(writer, "  Down:           {} ({:.1}%)", health.down, health.down_pct)?;
        self.services.write_note(writer)?;
        writeln!(writer)?;
        writeln!(writer, "Alerts")?;
        writeln!(writer, "  Active:         {}", self.overview.active_alerts)?;
        self.alerts.write_note(writer)?;

        if !self.overview.recent_alerts.is_empty() {
            writeln!(writer)?;
            write_alert_rows(writer, &self.overview.recent_alerts)?;
        }
        Ok(())
    }
}

/// Services with their health counters.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceList {
    /// Counters over the full collection.
    pub health: HealthCounters,
    /// Services matching the search.
    pub services: Vec<Service>,
    /// Freshness of the collection.
    pub freshness: Freshness,
}

impl TableDisplay for ServiceList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(
            writer,
            "Up: {}  Down: {}  Total: {}  ({:.1}% down)",
            self.health.up, self.health.down, self.health.total, self.health.down_pct
        )?;
        self.freshness.write_note(writer)?;
        writeln!(writer)?;

        if self.services.is_empty() {
            writeln!(writer, "No services")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:>6}  {:<24}  {:<6}  {:<6}  {:<36}  {:<16}",
            "ID", "NAME", "TYPE", "STATUS", "URL", "UPDATED"
        )?;
        writeln!(writer, "{}", "─".repeat(104))?;
        for service in &self.services {
            writeln!(
                writer,
                "{:>6}  {:<24}  {:<6}  {:<6}  {:<36}  {:<16}",
                service.id,
                truncate(&service.name, 24),
                truncate(&service.service_type, 6),
                service.status.as_str(),
                truncate(&service.url, 36),
                timestamp(&service.updated_at)
            )?;
        }
        writeln!(writer)?;
        writeln!(writer, "Shown: {} service(s)", self.services.len())?;
        Ok(())
    }
}

/// Alerts for listing.
#[derive(Debug, Clone, Serialize)]
pub struct AlertList {
    /// Alerts matching the filter and search.
    pub alerts: Vec<Alert>,
    /// Freshness of the collection.
    pub freshness: Freshness,
}

impl AlertList {
    /// Build a list, active alerts first.
    #[must_use]
    pub fn new(alerts: Vec<Alert>, freshness: Freshness) -> Self {
        let partition = AlertPartition::from_alerts(&alerts);
        let mut alerts = partition.active;
        alerts.extend(partition.resolved);
        Self { alerts, freshness }
    }
}

impl TableDisplay for AlertList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        self.freshness.write_note(writer)?;
        if self.alerts.is_empty() {
            writeln!(writer, "No alerts")?;
            return Ok(());
        }
        write_alert_rows(writer, &self.alerts)?;
        writeln!(writer)?;
        writeln!(writer, "Total: {} alert(s)", self.alerts.len())?;
        Ok(())
    }
}

fn write_alert_rows<W: Write>(writer: &mut W, alerts: &[Alert]) -> Result<(), CliError> {
    writeln!(
        writer,
        "{:>6}  {:<24}  {:<8}  {:<9}  {:<16}  {:<16}",
        "ID", "SERVICE", "STATUS", "VERIFIED", "STARTED", "RESOLVED"
    )?;
    writeln!(writer, "{}", "─".repeat(86))?;
    for alert in alerts {
        writeln!(
            writer,
            "{:>6}  {:<24}  {:<8}  {:<9}  {:<16}  {:<16}",
            alert.id,
            truncate(&alert.service_name, 24),
            alert.status.as_str(),
            alert.verification_status.as_str(),
            timestamp(&alert.started_at),
            alert.resolved_at.as_ref().map_or_else(|| "-".to_string(), timestamp)
        )?;
    }
    Ok(())
}

/// Users for listing.
#[derive(Debug, Clone, Serialize)]
pub struct UserList {
    /// Users matching the search.
    pub users: Vec<User>,
    /// Freshness of the collection.
    pub freshness: Freshness,
}

impl TableDisplay for UserList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        self.freshness.write_note(writer)?;
        if self.users.is_empty() {
            writeln!(writer, "No users")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<12}  {:<20}  {:<28}  {:<16}  {:<10}",
            "ID", "NAME", "EMAIL", "PHONE", "ROLE"
        )?;
        writeln!(writer, "{}", "─".repeat(94))?;
        for user in &self.users {
            writeln!(
                writer,
                "{:<12}  {:<20}  {:<28}  {:<16}  {:<10}",
                truncate(&user.id.to_string(), 12),
                truncate(&user.name, 20),
                truncate(&user.email, 28),
                truncate(&user.phone, 16),
                user.role
            )?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} user(s)", self.users.len())?;
        Ok(())
    }
}

/// Settings with the SMTP password masked.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    #[serde(flatten)]
    settings: Settings,
}

impl SettingsView {
    /// Wrap settings for display, masking the password.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let mut settings = settings.clone();
        if !settings.smtp_password.is_empty() {
            settings.smtp_password = "********".to_string();
        }
        Self { settings }
    }
}

impl TableDisplay for SettingsView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let s = &self.settings;
        writeln!(writer, "Monitoring")?;
        writeln!(writer, "  Check interval:     {}s", s.check_interval)?;
        writeln!(writer, "  Alert threshold:    {}", s.alert_threshold)?;
        writeln!(writer)?;
        writeln!(writer, "Notifications")?;
        writeln!(writer, "  Enabled:            {}", yes_no(s.enable_notifications))?;
        writeln!(writer, "  Email:              {}", yes_no(s.enable_email_alerts))?;
        writeln!(writer, "  SMS:                {}", yes_no(s.enable_sms_alerts))?;
        writeln!(writer)?;
        writeln!(writer, "SMTP")?;
        writeln!(writer, "  Server:             {}", or_dash(&s.smtp_server))?;
        writeln!(writer, "  Port:               {}", s.smtp_port)?;
        writeln!(writer, "  Username:           {}", or_dash(&s.smtp_username))?;
        writeln!(writer, "  Password:           {}", or_dash(&s.smtp_password))?;
        Ok(())
    }
}

/// Result of a write command.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse<T> {
    /// Human-readable summary.
    pub message: String,
    /// Entity returned by the server, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<T>,
}

impl<T> ActionResponse<T> {
    /// Create a response.
    #[must_use]
    pub fn new(message: impl Into<String>, entity: Option<T>) -> Self {
        Self {
            message: message.into(),
            entity,
        }
    }
}

impl<T> TableDisplay for ActionResponse<T> {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ {}", self.message)?;
        Ok(())
    }
}

/// One refresh observed by `services watch`.
#[derive(Debug, Clone, Serialize)]
pub struct WatchTick {
    /// When the refresh settled.
    pub at: DateTime<Utc>,
    /// Counters after the refresh.
    pub health: HealthCounters,
    /// Fetch outcome.
    pub freshness: Freshness,
}

impl TableDisplay for WatchTick {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let outcome = match &self.freshness.error {
            Some(error) => format!("refresh failed: {error}"),
            None => "ok".to_string(),
        };
        writeln!(
            writer,
            "[{}] up={} down={} total={} ({:.1}% down) {}",
            timestamp(&self.at),
            self.health.up,
            self.health.down,
            self.health.total,
            self.health.down_pct,
            outcome
        )?;
        Ok(())
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

/// Truncate a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use opswatch_client::{AlertStatus, ServiceStatus, UserId, VerificationStatus};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 22, 10, 30, 0).unwrap()
    }

    fn fresh() -> Freshness {
        Freshness {
            status: FetchStatus::Ready,
            last_fetched_at: Some(ts()),
            error: None,
        }
    }

    fn service(id: i64, status: ServiceStatus) -> Service {
        Service {
            id,
            name: format!("svc-{id}"),
            service_type: "http".into(),
            url: format!("https://svc-{id}.example.com"),
            config: String::new(),
            status,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn alert(id: i64, status: AlertStatus) -> Alert {
        Alert {
            id,
            service_id: 1,
            service_name: "svc-1".into(),
            status,
            verification_status: VerificationStatus::Pending,
            started_at: ts(),
            resolved_at: (status == AlertStatus::Resolved).then(ts),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[test]
    fn output_format_default_is_table() {
        let fmt = OutputFormat::default();
        assert_eq!(fmt.format(), Format::Table);
        assert!(!fmt.is_json());
    }

    #[test]
    fn service_list_table_output() {
        let services = vec![service(1, ServiceStatus::Up), service(2, ServiceStatus::Down)];
        let list = ServiceList {
            health: HealthCounters::from_services(&services),
            services,
            freshness: fresh(),
        };

        let output = OutputFormat::new(Format::Table).to_string(&list).unwrap();
        assert!(output.contains("Up: 1  Down: 1  Total: 2  (50.0% down)"));
        assert!(output.contains("svc-2"));
        assert!(output.contains("down"));
        assert!(output.contains("Shown: 2 service(s)"));
    }

    #[test]
    fn service_list_shows_failed_refresh() {
        let list = ServiceList {
            health: HealthCounters::default(),
            services: vec![],
            freshness: Freshness {
                status: FetchStatus::Error,
                last_fetched_at: None,
                error: Some("transport error: connection refused".into()),
            },
        };

        let output = OutputFormat::new(Format::Table).to_string(&list).unwrap();
        assert!(output.contains("last refresh failed: transport error"));
        assert!(output.contains("No services"));
    }

    #[test]
    fn alert_list_puts_active_first() {
        let list = AlertList::new(
            vec![alert(1, AlertStatus::Resolved), alert(2, AlertStatus::Active)],
            fresh(),
        );
        let ids: Vec<_> = list.alerts.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn alert_list_json_uses_wire_names() {
        let list = AlertList::new(vec![alert(7, AlertStatus::Active)], fresh());
        let output = OutputFormat::new(Format::Json).to_string(&list).unwrap();
        assert!(output.contains("\"verification_status\": \"pending\""));
        assert!(output.contains("\"status\": \"ready\""));
    }

    #[test]
    fn user_list_table_output() {
        let list = UserList {
            users: vec![User {
                id: UserId::Str("u-1".into()),
                name: "Ada".into(),
                email: "ada@example.com".into(),
                phone: "+15550100".into(),
                role: "admin".into(),
                created_at: ts(),
                updated_at: None,
            }],
            freshness: fresh(),
        };
        let output = OutputFormat::new(Format::Table).to_string(&list).unwrap();
        assert!(output.contains("u-1"));
        assert!(output.contains("Total: 1 user(s)"));
    }

    #[test]
    fn settings_view_masks_password() {
        let settings = Settings {
            smtp_password: "hunter2".into(),
            ..Settings::default()
        };
        let view = SettingsView::new(&settings);

        let json = OutputFormat::new(Format::Json).to_string(&view).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"smtpPort\": 587"));

        let table = OutputFormat::new(Format::Table).to_string(&view).unwrap();
        assert!(table.contains("Password:           ********"));
        assert!(table.contains("Server:             -"));
    }

    #[test]
    fn status_report_table_output() {
        let services = [service(1, ServiceStatus::Up), service(2, ServiceStatus::Down)];
        let alerts = [alert(7, AlertStatus::Active)];
        let report = StatusReport {
            overview: Overview::compute(&services, &alerts),
            services: fresh(),
            alerts: fresh(),
        };
        let output = OutputFormat::new(Format::Table).to_string(&report).unwrap();
        assert!(output.contains("Down:           1 (50.0%)"));
        assert!(output.contains("Active:         1"));
    }

    #[test]
    fn action_response_omits_missing_entity() {
        let response: ActionResponse<Service> = ActionResponse::new("Service 3 deleted", None);
        let json = OutputFormat::new(Format::Json).to_string(&response).unwrap();
        assert!(!json.contains("entity"));
        let table = OutputFormat::new(Format::Table).to_string(&response).unwrap();
        assert_eq!(table, "✓ Service 3 deleted\n");
    }

    #[test]
    fn truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_string() {
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn truncate_very_short_max() {
        assert_eq!(truncate("hello", 3), "hel");
    }
}
