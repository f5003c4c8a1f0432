//! HTTP ERP connector with rate limiting.
//!
//! Speaks a generic JSON contract: `POST /auth/login` yielding a bearer
//! token, then `GET /employees?page=N` pages through the roster. A
//! token-bucket rate limiter keeps bursts within what HR systems
//! typically tolerate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ErpConfig, RemoteEmployee};
use crate::domain::ports::{ErpConnector, ErpConnectorFactory};

use super::models::{AuthRequest, AuthResponse, EmployeePage};

/// Token-bucket rate limiter.
///
/// Allows up to `capacity` requests per `window`. When the bucket is
/// exhausted, [`acquire`](RateLimiter::acquire) sleeps until a token
/// becomes available.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    tokens: u32,
    window: Duration,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            tokens: capacity,
            window,
            window_start: Instant::now(),
        }
    }

    /// Acquire a single token, sleeping if necessary.
    pub async fn acquire(&mut self) {
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.window {
            self.tokens = self.capacity;
            self.window_start = Instant::now();
        }

        if self.tokens > 0 {
            self.tokens -= 1;
        } else {
            let remaining = self.window.saturating_sub(elapsed);
            tracing::warn!(
                sleep_ms = remaining.as_millis() as u64,
                "ERP rate limit reached, sleeping"
            );
            tokio::time::sleep(remaining).await;
            self.tokens = self.capacity - 1;
            self.window_start = Instant::now();
        }
    }
}

/// HTTP client implementing the [`ErpConnector`] contract.
#[derive(Debug, Clone)]
pub struct HttpErpConnector {
    http: Client,
    base_url: String,
    /// Bearer token obtained by `authenticate`.
    token: Arc<Mutex<Option<String>>>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl HttpErpConnector {
    pub fn new(base_url: String, request_timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(Mutex::new(None)),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(60, Duration::from_secs(60)))),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> DomainResult<String> {
        self.token
            .lock()
            .await
            .clone()
            .ok_or_else(|| DomainError::AuthenticationFailed("not authenticated".to_string()))
    }
}

#[async_trait]
impl ErpConnector for HttpErpConnector {
    async fn authenticate(&self, login: &str, password: &str) -> DomainResult<()> {
        self.rate_limiter.lock().await.acquire().await;

        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&AuthRequest { login, password })
            .send()
            .await
            .map_err(|e| DomainError::ConnectorUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let auth: AuthResponse = response
                    .json()
                    .await
                    .map_err(|e| DomainError::ConnectorUnavailable(e.to_string()))?;
                *self.token.lock().await = Some(auth.token);
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                DomainError::AuthenticationFailed(format!("login rejected for '{login}'")),
            ),
            status => Err(DomainError::ConnectorUnavailable(format!(
                "unexpected status {status} from login endpoint"
            ))),
        }
    }

    async fn list_employees(&self) -> DomainResult<Vec<RemoteEmployee>> {
        let token = self.bearer().await?;
        let mut employees = Vec::new();
        let mut page: u32 = 1;

        loop {
            self.rate_limiter.lock().await.acquire().await;

            let response = self
                .http
                .get(self.url("/employees"))
                .query(&[("page", page)])
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| DomainError::ConnectorUnavailable(e.to_string()))?;

            match response.status() {
                StatusCode::OK => {}
                StatusCode::UNAUTHORIZED => {
                    return Err(DomainError::AuthenticationFailed(
                        "roster token rejected".to_string(),
                    ))
                }
                status => {
                    return Err(DomainError::ConnectorUnavailable(format!(
                        "unexpected status {status} from employees endpoint"
                    )))
                }
            }

            let body: EmployeePage = response
                .json()
                .await
                .map_err(|e| DomainError::ConnectorUnavailable(e.to_string()))?;

            employees.extend(body.employees.into_iter().map(RemoteEmployee::from));

            match body.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        tracing::debug!(count = employees.len(), "Fetched employee roster");
        Ok(employees)
    }
}

/// Factory selecting a connector implementation by the config's
/// `provider` field. Every supported provider currently speaks the
/// generic JSON contract.
#[derive(Debug, Clone)]
pub struct HttpConnectorFactory {
    request_timeout: Duration,
}

impl HttpConnectorFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl ErpConnectorFactory for HttpConnectorFactory {
    fn create(&self, config: &ErpConfig) -> DomainResult<Box<dyn ErpConnector>> {
        match config.provider.as_str() {
            "onec" | "sap" | "generic" => Ok(Box::new(HttpErpConnector::new(
                config.base_url.clone(),
                self.request_timeout,
            ))),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown ERP provider '{other}'"
            ))),
        }
    }
}
