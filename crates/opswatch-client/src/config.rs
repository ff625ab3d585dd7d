//! Client and cache configuration.

use std::time::Duration;

use crate::error::{ClientError, Result};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Default polling period for the services key.
pub const DEFAULT_SERVICES_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for the HTTP repository.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every REST path is appended to.
    pub base_url: String,
    /// Optional per-request timeout. `None` leaves the transport default.
    pub request_timeout: Option<Duration>,
    /// Value sent as the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            user_agent: format!("opswatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set a request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check the configuration and return the normalized base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the base URL is not http(s).
    pub fn validated_base_url(&self) -> Result<String> {
        let url = self.base_url.trim().trim_end_matches('/');
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ClientError::Config(format!(
                "invalid base URL: {url}, must start with http:// or https://"
            )));
        }
        Ok(url.to_string())
    }
}

/// Configuration for the synchronization cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Polling period for the services key while subscribed.
    pub services_poll_interval: Duration,
    /// Capacity of the cache event broadcast channel.
    pub event_capacity: usize,
    /// Patch server-returned entities into cached collections after a
    /// successful mutation, before the invalidation refetch lands.
    pub patch_on_mutation: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            services_poll_interval: DEFAULT_SERVICES_POLL_INTERVAL,
            event_capacity: 256,
            patch_on_mutation: false,
        }
    }
}

impl CacheConfig {
    /// Set the services polling period.
    #[must_use]
    pub const fn with_services_poll_interval(mut self, interval: Duration) -> Self {
        self.services_poll_interval = interval;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Enable or disable targeted patching after mutations.
    #[must_use]
    pub const fn with_patch_on_mutation(mut self, enabled: bool) -> Self {
        self.patch_on_mutation = enabled;
        self
    }
}
