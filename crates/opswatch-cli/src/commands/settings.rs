//! Settings command implementation.

use std::io::Write;

use opswatch_client::{CacheKey, MutationPipeline, Repository, Settings, SyncCache};

use crate::cli::{SaveSettingsArgs, SettingsCommands};
use crate::commands::load;
use crate::error::CliError;
use crate::output::{ActionResponse, OutputFormat, SettingsView};

/// Handler for settings subcommands.
pub struct SettingsCommand<'a, R> {
    cache: &'a SyncCache<R>,
}

impl<'a, R: Repository> SettingsCommand<'a, R> {
    /// Creates a new settings command handler.
    #[must_use]
    pub const fn new(cache: &'a SyncCache<R>) -> Self {
        Self { cache }
    }

    /// Executes the settings subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &SettingsCommands,
    ) -> Result<(), CliError> {
        match command {
            SettingsCommands::Show => {
                let settings = self.current().await?;
                format.write(out, &SettingsView::new(&settings))
            }
            SettingsCommands::Save(args) => self.save(out, format, args).await,
        }
    }

    async fn current(&self) -> Result<Settings, CliError> {
        load(self.cache, CacheKey::Settings).await?;
        self.cache
            .settings()
            .data
            .map(|settings| Settings::clone(&settings))
            .ok_or_else(|| CliError::Config("settings unavailable".into()))
    }

    async fn save<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &SaveSettingsArgs,
    ) -> Result<(), CliError> {
        let settings = apply(self.current().await?, args);
        let saved = MutationPipeline::new(self.cache.clone())
            .save_settings(settings)
            .await?;

        let response = ActionResponse::new("Settings saved", Some(SettingsView::new(&saved)));
        format.write(out, &response)
    }
}

/// Overlay the flags that were given on top of `settings`.
fn apply(mut settings: Settings, args: &SaveSettingsArgs) -> Settings {
    if let Some(v) = args.check_interval {
        settings.check_interval = v;
    }
    if let Some(v) = args.alert_threshold {
        settings.alert_threshold = v;
    }
    if let Some(v) = args.notifications {
        settings.enable_notifications = v;
    }
    if let Some(v) = args.email_alerts {
        settings.enable_email_alerts = v;
    }
    if let Some(v) = args.sms_alerts {
        settings.enable_sms_alerts = v;
    }
    if let Some(v) = &args.smtp_server {
        settings.smtp_server.clone_from(v);
    }
    if let Some(v) = args.smtp_port {
        settings.smtp_port = v;
    }
    if let Some(v) = &args.smtp_username {
        settings.smtp_username.clone_from(v);
    }
    if let Some(v) = &args.smtp_password {
        settings.smtp_password.clone_from(v);
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use crate::commands::fake::FakeRepository;

    #[test]
    fn apply_overrides_only_given_fields() {
        let args = SaveSettingsArgs {
            smtp_port: Some(2525),
            sms_alerts: Some(false),
            ..SaveSettingsArgs::default()
        };
        let settings = apply(Settings::default(), &args);

        assert_eq!(settings.smtp_port, 2525);
        assert!(!settings.enable_sms_alerts);
        assert_eq!(settings.check_interval, 300);
        assert!(settings.enable_email_alerts);
    }

    #[tokio::test]
    async fn show_prints_defaults() {
        let cache = FakeRepository::seeded().cache();
        let mut buf = Vec::new();
        SettingsCommand::new(&cache)
            .execute(&mut buf, &OutputFormat::new(Format::Table), &SettingsCommands::Show)
            .await
            .unwrap();

        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("Check interval:     300s"));
        assert!(output.contains("Port:               587"));
    }

    #[tokio::test]
    async fn save_persists_and_masks_password() {
        let repo = FakeRepository::seeded();
        let cache = repo.cache();
        let args = SaveSettingsArgs {
            check_interval: Some(60),
            smtp_password: Some("hunter2".into()),
            ..SaveSettingsArgs::default()
        };

        let mut buf = Vec::new();
        SettingsCommand::new(&cache)
            .execute(&mut buf, &OutputFormat::new(Format::Json), &SettingsCommands::Save(args))
            .await
            .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("\"checkInterval\": 60"));
        assert!(!output.contains("hunter2"));

        let stored = repo.get_settings().await.unwrap();
        assert_eq!(stored.smtp_password, "hunter2");
    }
}
