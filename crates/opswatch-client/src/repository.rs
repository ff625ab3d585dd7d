//! Entity repository: one network round trip per entity operation.
//!
//! The [`Repository`] trait is the seam between the cache/mutation layers and
//! the transport. [`HttpRepository`] implements it against the REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | services | `GET /services`, `POST /services`, `PUT /services/{id}`, `DELETE /services/{id}` |
//! | alerts | `GET /alerts`, `POST /alerts/{id}/resolve`, `POST /alerts/{id}/verify` |
//! | users | `GET /users`, `POST /users`, `PUT /users/{id}`, `DELETE /users/{id}` |
//! | settings | `GET /settings`, `PUT /settings` |
//!
//! No operation retries; retry policy belongs to the caller.

use std::future::Future;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::types::{
    Alert, NewService, NewUser, Service, ServicePatch, Settings, User, UserId, UserPatch,
};

/// Typed access to server-owned entities.
///
/// Every method performs exactly one round trip and either returns the
/// entity/collection or fails with [`ClientError::Transport`] or
/// [`ClientError::Api`].
pub trait Repository: Send + Sync + 'static {
    /// List all services.
    fn list_services(&self) -> impl Future<Output = Result<Vec<Service>>> + Send;

    /// Register a new service.
    fn create_service(&self, service: &NewService) -> impl Future<Output = Result<Service>> + Send;

    /// Apply a partial update to a service.
    fn update_service(
        &self,
        id: i64,
        patch: &ServicePatch,
    ) -> impl Future<Output = Result<Service>> + Send;

    /// Delete a service.
    fn delete_service(&self, id: i64) -> impl Future<Output = Result<()>> + Send;

    /// List all alerts.
    fn list_alerts(&self) -> impl Future<Output = Result<Vec<Alert>>> + Send;

    /// Resolve an alert. Returns the alert as the backend now sees it.
    fn resolve_alert(&self, id: i64) -> impl Future<Output = Result<Alert>> + Send;

    /// Verify an alert. Returns the alert as the backend now sees it.
    fn verify_alert(&self, id: i64) -> impl Future<Output = Result<Alert>> + Send;

    /// List all users.
    fn list_users(&self) -> impl Future<Output = Result<Vec<User>>> + Send;

    /// Create a user.
    fn create_user(&self, user: &NewUser) -> impl Future<Output = Result<User>> + Send;

    /// Apply a partial update to a user.
    fn update_user(&self, id: &UserId, patch: &UserPatch)
        -> impl Future<Output = Result<User>> + Send;

    /// Delete a user.
    fn delete_user(&self, id: &UserId) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the settings singleton.
    fn get_settings(&self) -> impl Future<Output = Result<Settings>> + Send;

    /// Replace the settings singleton.
    fn save_settings(&self, settings: &Settings) -> impl Future<Output = Result<Settings>> + Send;
}

/// [`Repository`] backed by the REST API.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: String,
}

impl HttpRepository {
    /// Build a repository from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the base URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.validated_base_url()?;

        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        debug!(base_url = %base_url, "HTTP repository ready");
        Ok(Self { client, base_url })
    }

    /// Returns the normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        trace!(%method, %url, "building request");
        self.client.request(method, url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let bytes = self.execute(request).await?;
        serde_json::from_slice(&bytes).map_err(ClientError::from)
    }

    async fn send_json<B, T>(&self, request: RequestBuilder, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.send(request.json(body)).await
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = request.send().await.map_err(ClientError::from)?;

        let status = response.status();
        let url = response.url().path().to_string();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(status = status.as_u16(), path = %url, error = %e, "failed to read error body");
                    String::new()
                }
            };
            debug!(status = status.as_u16(), path = %url, "request failed");
            return Err(ClientError::api(status.as_u16(), body));
        }

        let bytes = response.bytes().await.map_err(ClientError::from)?;
        trace!(status = status.as_u16(), path = %url, len = bytes.len(), "response received");
        Ok(bytes.to_vec())
    }
}

impl Repository for HttpRepository {
    async fn list_services(&self) -> Result<Vec<Service>> {
        self.send(self.request(Method::GET, "/services")).await
    }

    async fn create_service(&self, service: &NewService) -> Result<Service> {
        self.send_json(self.request(Method::POST, "/services"), service)
            .await
    }

    async fn update_service(&self, id: i64, patch: &ServicePatch) -> Result<Service> {
        self.send_json(self.request(Method::PUT, &format!("/services/{id}")), patch)
            .await
    }

    async fn delete_service(&self, id: i64) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("/services/{id}")))
            .await
            .map(drop)
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        self.send(self.request(Method::GET, "/alerts")).await
    }

    async fn resolve_alert(&self, id: i64) -> Result<Alert> {
        self.send(self.request(Method::POST, &format!("/alerts/{id}/resolve")))
            .await
    }

    async fn verify_alert(&self, id: i64) -> Result<Alert> {
        self.send(self.request(Method::POST, &format!("/alerts/{id}/verify")))
            .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.send(self.request(Method::GET, "/users")).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        self.send_json(self.request(Method::POST, "/users"), user).await
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User> {
        self.send_json(self.request(Method::PUT, &format!("/users/{id}")), patch)
            .await
    }

    async fn delete_user(&self, id: &UserId) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("/users/{id}")))
            .await
            .map(drop)
    }

    async fn get_settings(&self) -> Result<Settings> {
        self.send(self.request(Method::GET, "/settings")).await
    }

    async fn save_settings(&self, settings: &Settings) -> Result<Settings> {
        self.send_json(self.request(Method::PUT, "/settings"), settings)
            .await
    }
}
