//! HTTP client implementation for the Fitbit Web API.
//!
//! This module provides the reqwest-based implementation of the
//! [`FitbitApi`](crate::FitbitApi) trait, wrapping every call in the
//! class-specific retry loop described by [`RetryPolicy`].

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::observability::{API_REQUESTS_TOTAL, API_RETRIES_TOTAL};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::token::TokenStore;
use crate::{ApiErrorKind, FitbitApi, FitbitError, QueryParams};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the Fitbit Web API using reqwest.
pub struct FitbitHttpClient {
    base_url: String,
    language: String,
    client: reqwest::Client,
    tokens: TokenStore,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl FitbitHttpClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.fitbit.com`
    /// * `language` - value sent as `Accept-Language`
    /// * `tokens` - credential owner used for bearer auth
    pub fn new(
        base_url: &str,
        language: impl Into<String>,
        tokens: TokenStore,
    ) -> Result<Self, FitbitError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.into(),
            client,
            tokens,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Issue an authenticated request with bounded retries.
    ///
    /// Returns `Ok(None)` once `max_attempts` attempts failed with retryable
    /// classes (429, 401, 5xx, connection errors). Any other non-2xx status
    /// aborts immediately with [`FitbitError::Api`].
    pub async fn request(
        &mut self,
        method: Method,
        endpoint: &str,
        params: &QueryParams<'_>,
    ) -> Result<Option<serde_json::Value>, FitbitError> {
        let url = self.url(endpoint);
        debug!(%endpoint, "requesting endpoint");

        let mut last_failure = String::new();
        for attempt in 1..=self.policy.max_attempts {
            let token = self.tokens.current_access_token().await?;
            let sent = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(token.expose_secret())
                .header(ACCEPT, "application/json")
                .header(ACCEPT_LANGUAGE, &self.language)
                .query(params)
                .send()
                .await;

            match sent {
                Ok(resp) => {
                    let status = resp.status();
                    let Some(kind) = ApiErrorKind::classify(status) else {
                        metrics::counter!(API_REQUESTS_TOTAL, "outcome" => "success").increment(1);
                        return match resp.json::<serde_json::Value>().await {
                            Ok(body) => Ok(Some(body)),
                            Err(e) => {
                                error!(%endpoint, error = %e, "response body is not valid json");
                                Ok(None)
                            }
                        };
                    };
                    metrics::counter!(API_REQUESTS_TOTAL, "outcome" => kind.as_str()).increment(1);

                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let body = resp.text().await.unwrap_or_default();
                    let body_snippet: String = body.chars().take(256).collect();

                    let Some(delay) = self.policy.backoff_for(kind, retry_after.as_deref()) else {
                        error!(
                            %endpoint,
                            status = status.as_u16(),
                            body = %body_snippet,
                            "fitbit api request failed"
                        );
                        return Err(FitbitError::Api {
                            kind,
                            status: status.as_u16(),
                            body: body_snippet,
                        });
                    };

                    match kind {
                        ApiErrorKind::RateLimited => {
                            warn!(
                                %endpoint,
                                attempt,
                                delay_secs = delay.as_secs(),
                                "hit api rate limit, retrying"
                            )
                        }
                        ApiErrorKind::Unauthorized => {
                            warn!(
                                %endpoint,
                                attempt,
                                body = %body_snippet,
                                "unauthorized, retrying"
                            )
                        }
                        _ => warn!(
                            %endpoint,
                            attempt,
                            status = status.as_u16(),
                            delay_secs = delay.as_secs(),
                            "server error, retrying"
                        ),
                    }
                    metrics::counter!(API_RETRIES_TOTAL, "reason" => kind.as_str()).increment(1);
                    last_failure = format!("status {status}: {body_snippet}");
                    self.sleeper.sleep(delay).await;
                }
                Err(e) => {
                    metrics::counter!(API_REQUESTS_TOTAL, "outcome" => "network_error")
                        .increment(1);
                    metrics::counter!(API_RETRIES_TOTAL, "reason" => "network_error").increment(1);
                    error!(%endpoint, attempt, error = %e, "connection error, retrying");
                    last_failure = e.to_string();
                }
            }
            self.sleeper.sleep(self.policy.pacing_delay).await;
        }

        error!(%endpoint, last_failure = %last_failure, "retry limit exceeded");
        Ok(None)
    }
}

#[async_trait]
impl FitbitApi for FitbitHttpClient {
    async fn get_json(
        &mut self,
        endpoint: &str,
        params: &QueryParams<'_>,
    ) -> Result<Option<serde_json::Value>, FitbitError> {
        self.request(Method::GET, endpoint, params).await
    }
}
