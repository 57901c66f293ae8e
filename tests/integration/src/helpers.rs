//! Test helpers for integration tests
//!
//! Provides the test server, HTTP request helpers and response assertions.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use sgc_api::{create_app, create_app_state_with, serve, AppState};
use sgc_common::AppConfig;
use sgc_core::{Account, NewAccount, Role};
use sgc_db::Repositories;
use sgc_service::{CapturingMailer, MaintenanceService};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Settings every test server starts from
const BASE_SETTINGS: &[(&str, &str)] = &[
    ("APP_ENV", "development"),
    ("STORAGE_BACKEND", "memory"),
    ("SECRET_KEY", "integration-tests-secret-key-0123456789"),
    ("SESSION_COOKIE_SECURE", "false"),
    ("PUBLIC_BASE_URL", "http://sgc.test"),
    ("ENABLE_2FA", "false"),
];

/// Builder for the environment a test server reads
#[derive(Debug, Clone)]
pub struct TestSettings {
    vars: HashMap<String, String>,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            vars: BASE_SETTINGS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl TestSettings {
    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_mfa(self) -> Self {
        self.set("ENABLE_2FA", "true")
    }

    pub fn config(&self) -> Result<AppConfig> {
        AppConfig::from_lookup(|key| self.vars.get(key).cloned())
            .map_err(|e| anyhow::anyhow!("Config error: {}", e))
    }
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    state: AppState,
    mailer: Arc<CapturingMailer>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with the default settings
    pub async fn start() -> Result<Self> {
        Self::start_with(TestSettings::default()).await
    }

    /// Start a test server with custom settings
    pub async fn start_with(settings: TestSettings) -> Result<Self> {
        let config = settings.config()?;
        let mailer = Arc::new(CapturingMailer::new());

        let state = create_app_state_with(config, Repositories::memory(), mailer.clone()).await?;
        let app = create_app(state.clone());

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            serve(listener, app).await.ok();
        });

        // Redirects are asserted, never followed; the session rides in the jar
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .cookie_store(true)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            addr,
            client,
            state,
            mailer,
            handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Mail the server has "sent"
    pub fn mailer(&self) -> &CapturingMailer {
        &self.mailer
    }

    /// Seed an approved admin the way the operator CLI does
    pub async fn seed_admin(&self, email: &str, password: &str) -> Result<Account> {
        let outcome = MaintenanceService::new(self.state.service_context())
            .seed_admin(email, password, None)
            .await?;
        Ok(outcome.account().clone())
    }

    /// Create an approved account with the given role
    pub async fn create_user(&self, username: &str, email: &str, password: &str, role: Role) -> Result<Account> {
        let ctx = self.state.service_context();
        let hash = ctx.passwords().hash(password)?;
        Ok(ctx
            .accounts()
            .create(&NewAccount::approved(username, Some(email), hash, role))
            .await?)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a GET request with auth token
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).json(body).send().await?)
    }

    /// Make a POST request with auth token
    pub async fn post_auth<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(body)
            .send()
            .await?)
    }

    /// Submit an HTML form
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.post(&url).form(fields).send().await?)
    }

    /// Make a PATCH request with auth token
    pub async fn patch_auth<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(body)
            .send()
            .await?)
    }

    /// Make a DELETE request with auth token
    pub async fn delete_auth(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(response: Response, expected_status: StatusCode) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!(
            "Expected status {}, got {}. Body: {}",
            expected_status,
            status,
            body
        );
    }
    Ok(())
}

/// Assert a 302 and return its Location
pub fn assert_redirect(response: &Response) -> Result<String> {
    if response.status() != StatusCode::FOUND {
        anyhow::bail!("Expected redirect, got {}", response.status());
    }
    let location = response
        .headers()
        .get(LOCATION)
        .context("redirect without Location")?
        .to_str()?;
    Ok(location.to_string())
}

/// Assert a 200 HTML page and return its body
pub async fn assert_page(response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if status != StatusCode::OK {
        anyhow::bail!("Expected page, got {}. Body: {}", status, body);
    }
    Ok(body)
}
