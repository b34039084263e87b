//! OAuth2 credential lifecycle.
//!
//! [`TokenStore`] owns the single live [`Credential`] of the process. It is
//! loaded from a JSON file at startup and refreshed lazily whenever an access
//! token is requested after expiry. A refreshed credential is written to disk
//! before it replaces the in-memory one.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::FitbitError;

/// Seconds subtracted from the issued lifetime of every access token.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 300;

/// Upper bound on one refresh exchange, connect to body.
pub const REFRESH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// HTTP client for the token endpoint, bounded by [`REFRESH_TIMEOUT`].
pub fn refresh_http_client() -> Result<reqwest::Client, FitbitError> {
    Ok(reqwest::Client::builder().timeout(REFRESH_TIMEOUT).build()?)
}

/// OAuth2 application registration used for the refresh exchange.
#[derive(Clone, Debug)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
}

impl OAuthApp {
    fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret.expose_secret());
        format!("Basic {}", STANDARD.encode(raw))
    }
}

#[derive(Clone, Debug)]
pub struct Credential {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// A credential that only knows its refresh token. It is already expired,
    /// so the first token request performs a refresh.
    pub fn from_refresh_token(refresh_token: SecretString) -> Self {
        Self {
            access_token: SecretString::new("".into()),
            refresh_token,
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// On-disk layout of the credential file.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialRecord {
    #[serde(default)]
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expiry_timestamp: i64,
}

impl From<CredentialRecord> for Credential {
    fn from(r: CredentialRecord) -> Self {
        Self {
            access_token: SecretString::new(r.access_token.into()),
            refresh_token: SecretString::new(r.refresh_token.into()),
            expires_at: DateTime::from_timestamp(r.expiry_timestamp, 0)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

impl From<&Credential> for CredentialRecord {
    fn from(c: &Credential) -> Self {
        Self {
            access_token: c.access_token.expose_secret().to_string(),
            refresh_token: c.refresh_token.expose_secret().to_string(),
            expiry_timestamp: c.expires_at.timestamp(),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

pub struct TokenStore {
    path: PathBuf,
    app: OAuthApp,
    http: reqwest::Client,
    credential: Option<Credential>,
    refresh_count: u64,
}

impl TokenStore {
    /// Load the credential file at `path`. A missing file is not an error: the
    /// store starts empty and needs [`TokenStore::bootstrap`] before use.
    pub fn load(
        path: impl Into<PathBuf>,
        app: OAuthApp,
        http: reqwest::Client,
    ) -> Result<Self, FitbitError> {
        let path = path.into();
        let credential = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let record: CredentialRecord = serde_json::from_str(&raw)?;
                Some(Credential::from(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "no token file found");
                None
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            app,
            http,
            credential,
            refresh_count: 0,
        })
    }

    /// Seed the store with an out-of-band refresh token when no credential
    /// file was found. An already loaded credential wins.
    pub fn bootstrap(&mut self, refresh_token: SecretString) {
        if self.credential.is_none() {
            self.credential = Some(Credential::from_refresh_token(refresh_token));
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of refreshed credentials this store has persisted.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Return a valid access token, refreshing first if the held one expired.
    pub async fn current_access_token(&mut self) -> Result<SecretString, FitbitError> {
        let credential = self.credential.as_ref().ok_or_else(|| {
            FitbitError::AuthUnavailable(format!(
                "no token file at {} and no refresh token supplied",
                self.path.display()
            ))
        })?;
        if !credential.is_expired_at(Utc::now()) {
            return Ok(credential.access_token.clone());
        }
        let refresh_token = credential.refresh_token.clone();
        let refreshed = self.refresh(&refresh_token).await?;
        let token = refreshed.access_token.clone();
        self.credential = Some(refreshed);
        Ok(token)
    }

    async fn refresh(&mut self, refresh_token: &SecretString) -> Result<Credential, FitbitError> {
        info!("attempting to refresh tokens");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
        ];
        let resp = self
            .http
            .post(&self.app.token_url)
            .header(reqwest::header::AUTHORIZATION, self.app.basic_auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| FitbitError::AuthRefreshFailed(format!("token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body_snippet: String = body.chars().take(256).collect();
            return Err(FitbitError::AuthRefreshFailed(format!(
                "status {status}: {body_snippet}"
            )));
        }
        let payload: TokenResponse = resp.json().await.map_err(|e| {
            FitbitError::AuthRefreshFailed(format!("unreadable token response: {e}"))
        })?;
        let credential = Credential {
            access_token: SecretString::new(payload.access_token.into()),
            refresh_token: SecretString::new(payload.refresh_token.into()),
            expires_at: Utc::now() + Duration::seconds(payload.expires_in)
                - Duration::seconds(EXPIRY_SAFETY_MARGIN_SECS),
        };
        persist(&self.path, &credential)?;
        self.refresh_count += 1;
        info!(expires_at = %credential.expires_at, "refreshed fitbit token");
        Ok(credential)
    }
}

/// Write the credential next to its final location, then rename over it.
fn persist(path: &Path, credential: &Credential) -> Result<(), FitbitError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let body = serde_json::to_string_pretty(&CredentialRecord::from(credential))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(body.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| FitbitError::CredentialStore(e.error))?;
    Ok(())
}
