//! Command-line argument parsing with clap.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Opswatch CLI - service health, alerts and users from the terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "opswatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the Opswatch API.
    #[arg(
        short,
        long,
        env = "OPSWATCH_API_URL",
        default_value = "http://localhost:8080/api"
    )]
    pub api_url: String,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Services polling period in seconds.
    #[arg(long, env = "OPSWATCH_POLL_INTERVAL", default_value_t = 30)]
    pub poll_interval: u64,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show service health and open alerts.
    Status,

    /// Monitored services.
    Services {
        /// Services subcommand to execute.
        #[command(subcommand)]
        command: ServiceCommands,
    },

    /// Alerts raised against services.
    Alerts {
        /// Alerts subcommand to execute.
        #[command(subcommand)]
        command: AlertCommands,
    },

    /// Operator accounts.
    Users {
        /// Users subcommand to execute.
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Dashboard settings.
    Settings {
        /// Settings subcommand to execute.
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

/// Service subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ServiceCommands {
    /// List services with health counters.
    List {
        /// Only show services with a field containing this text.
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Register a new service.
    Create(CreateServiceArgs),

    /// Update fields of a service.
    Update(UpdateServiceArgs),

    /// Delete a service.
    Delete {
        /// Service ID.
        id: i64,
    },

    /// Keep polling services and print each refresh.
    Watch {
        /// Stop after this many refreshes.
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
}

/// Arguments for creating a service.
#[derive(Args, Debug, Clone)]
pub struct CreateServiceArgs {
    /// Display name.
    #[arg(long)]
    pub name: String,

    /// Check kind (http, tcp, icmp, custom).
    #[arg(long = "type", default_value = "http")]
    pub service_type: String,

    /// Target URL or host.
    #[arg(long)]
    pub url: String,

    /// Check configuration as a JSON string.
    #[arg(long)]
    pub config: Option<String>,
}

/// Arguments for updating a service.
#[derive(Args, Debug, Clone)]
pub struct UpdateServiceArgs {
    /// Service ID.
    pub id: i64,

    /// New display name.
    #[arg(long)]
    pub name: Option<String>,

    /// New check kind.
    #[arg(long = "type")]
    pub service_type: Option<String>,

    /// New target.
    #[arg(long)]
    pub url: Option<String>,

    /// New check configuration.
    #[arg(long)]
    pub config: Option<String>,
}

/// Which alerts to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum AlertFilter {
    /// Active alerts only.
    #[default]
    Active,
    /// Resolved alerts only.
    Resolved,
    /// Both.
    All,
}

/// Alert subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum AlertCommands {
    /// List alerts.
    List {
        /// Which alerts to show.
        #[arg(long, value_enum, default_value_t = AlertFilter::Active)]
        state: AlertFilter,

        /// Only show alerts with a field containing this text.
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Mark an alert resolved.
    Resolve {
        /// Alert ID.
        id: i64,
    },

    /// Mark an alert verified.
    Verify {
        /// Alert ID.
        id: i64,
    },
}

/// User subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommands {
    /// List users.
    List {
        /// Only show users with a field containing this text.
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Create a user.
    Create(CreateUserArgs),

    /// Update fields of a user.
    Update(UpdateUserArgs),

    /// Delete a user.
    Delete {
        /// User ID.
        id: String,
    },
}

/// Arguments for creating a user.
#[derive(Args, Debug, Clone)]
pub struct CreateUserArgs {
    /// Display name.
    #[arg(long)]
    pub name: String,

    /// Email address.
    #[arg(long)]
    pub email: String,

    /// Phone number.
    #[arg(long)]
    pub phone: String,

    /// Role.
    #[arg(long, default_value = "viewer")]
    pub role: String,
}

/// Arguments for updating a user.
#[derive(Args, Debug, Clone)]
pub struct UpdateUserArgs {
    /// User ID.
    pub id: String,

    /// New display name.
    #[arg(long)]
    pub name: Option<String>,

    /// New email.
    #[arg(long)]
    pub email: Option<String>,

    /// New phone.
    #[arg(long)]
    pub phone: Option<String>,

    /// New role.
    #[arg(long)]
    pub role: Option<String>,
}

/// Settings subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommands {
    /// Show current settings.
    Show,

    /// Change settings. Unset flags keep their current value.
    Save(SaveSettingsArgs),
}

/// Arguments for saving settings.
#[derive(Args, Debug, Clone, Default)]
pub struct SaveSettingsArgs {
    /// Health-check interval in seconds.
    #[arg(long)]
    pub check_interval: Option<u32>,

    /// Consecutive failures before alerting.
    #[arg(long)]
    pub alert_threshold: Option<u32>,

    /// Master notification switch.
    #[arg(long)]
    pub notifications: Option<bool>,

    /// Email notifications.
    #[arg(long)]
    pub email_alerts: Option<bool>,

    /// SMS notifications.
    #[arg(long)]
    pub sms_alerts: Option<bool>,

    /// SMTP host.
    #[arg(long)]
    pub smtp_server: Option<String>,

    /// SMTP port.
    #[arg(long)]
    pub smtp_port: Option<u16>,

    /// SMTP user.
    #[arg(long)]
    pub smtp_username: Option<String>,

    /// SMTP password.
    #[arg(long, env = "OPSWATCH_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,
}
