//! Resilient Fitbit Web API client: OAuth2 token lifecycle, class-specific
//! retry policy and the `FitbitApi` seam used by the sync service.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod config;
pub mod http_client;
pub mod observability;
pub mod retry;
pub mod token;

pub use config::Config;
pub use http_client::FitbitHttpClient;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use token::{Credential, OAuthApp, TokenStore};

/// Failure classes of a non-2xx API response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    RateLimited,
    Unauthorized,
    ServerError,
    Unexpected,
}

impl ApiErrorKind {
    /// Classify a non-success status. Returns `None` for 2xx.
    pub fn classify(status: reqwest::StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }
        Some(match status.as_u16() {
            429 => Self::RateLimited,
            401 => Self::Unauthorized,
            _ if status.is_server_error() => Self::ServerError,
            _ => Self::Unexpected,
        })
    }

    /// Whether the retry loop should try again after this class.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Unexpected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::ServerError => "server_error",
            Self::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FitbitError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no credential available: {0}")]
    AuthUnavailable(String),
    #[error("token refresh failed: {0}")]
    AuthRefreshFailed(String),
    #[error("api error ({kind}) status {status}: {body}")]
    Api {
        kind: ApiErrorKind,
        status: u16,
        body: String,
    },
    #[error("credential store error: {0}")]
    CredentialStore(#[from] std::io::Error),
    #[error("invalid credential record: {0}")]
    CredentialFormat(#[from] serde_json::Error),
}

impl FitbitError {
    /// Fatal errors end the whole sync run; everything else is isolated to
    /// the metric/window that produced it.
    pub fn is_fatal(&self) -> bool {
        match self {
            FitbitError::Http(_) => false,
            FitbitError::Api { kind, .. } => !kind.is_retryable(),
            _ => true,
        }
    }
}

/// Query parameters appended to an endpoint.
pub type QueryParams<'a> = [(&'a str, String)];

/// Read access to the Fitbit Web API.
///
/// Calls are sequential and take `&mut self`: the implementation owns the
/// credential and may refresh it in place.
#[async_trait]
pub trait FitbitApi: Send {
    /// GET `endpoint` (relative to the API root).
    ///
    /// `Ok(None)` means the retry budget was exhausted; the caller should skip
    /// this fetch and carry on. `Err` is reserved for fatal failures.
    async fn get_json(
        &mut self,
        endpoint: &str,
        params: &QueryParams<'_>,
    ) -> Result<Option<serde_json::Value>, FitbitError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn classify_maps_statuses_to_kinds() {
        assert_eq!(ApiErrorKind::classify(StatusCode::OK), None);
        assert_eq!(ApiErrorKind::classify(StatusCode::NO_CONTENT), None);
        assert_eq!(
            ApiErrorKind::classify(StatusCode::TOO_MANY_REQUESTS),
            Some(ApiErrorKind::RateLimited)
        );
        assert_eq!(
            ApiErrorKind::classify(StatusCode::UNAUTHORIZED),
            Some(ApiErrorKind::Unauthorized)
        );
        assert_eq!(
            ApiErrorKind::classify(StatusCode::BAD_GATEWAY),
            Some(ApiErrorKind::ServerError)
        );
        assert_eq!(
            ApiErrorKind::classify(StatusCode::FORBIDDEN),
            Some(ApiErrorKind::Unexpected)
        );
        assert_eq!(
            ApiErrorKind::classify(StatusCode::NOT_FOUND),
            Some(ApiErrorKind::Unexpected)
        );
    }

    #[test]
    fn only_unexpected_api_errors_are_fatal() {
        let unexpected = FitbitError::Api {
            kind: ApiErrorKind::Unexpected,
            status: 400,
            body: String::new(),
        };
        let throttled = FitbitError::Api {
            kind: ApiErrorKind::RateLimited,
            status: 429,
            body: String::new(),
        };
        assert!(unexpected.is_fatal());
        assert!(!throttled.is_fatal());
        assert!(FitbitError::AuthRefreshFailed("nope".into()).is_fatal());
        assert!(FitbitError::AuthUnavailable("nope".into()).is_fatal());
    }
}
