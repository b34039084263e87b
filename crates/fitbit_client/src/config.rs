use crate::FitbitError;
use secrecy::SecretString;
use std::path::PathBuf;

pub const DEFAULT_API_URI: &str = "https://api.fitbit.com";
pub const DEFAULT_LANGUAGE: &str = "en_US";
pub const DEFAULT_TOKEN_FILE: &str = "token_file.json";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug)]
pub struct Config {
    pub client_id: String,
    pub client_secret: SecretString,
    pub api_uri: String,
    pub language: String,
    pub token_file: PathBuf,
    /// Used only when `token_file` does not exist yet.
    pub bootstrap_refresh_token: Option<SecretString>,
    pub max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, FitbitError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, FitbitError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let client_id = get("CLIENT_ID")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FitbitError::Config("CLIENT_ID missing".into()))?;
        let client_secret = get("CLIENT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FitbitError::Config("CLIENT_SECRET missing".into()))?;
        let api_uri = get("FITBIT_API_URI").unwrap_or_else(|| DEFAULT_API_URI.into());
        let language = get("FITBIT_LANGUAGE")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.into());
        let token_file = get("TOKEN_FILE_PATH")
            .unwrap_or_else(|| DEFAULT_TOKEN_FILE.into())
            .into();
        let bootstrap_refresh_token = get("FITBIT_REFRESH_TOKEN")
            .filter(|s| !s.is_empty())
            .map(|t| SecretString::new(t.into()));
        let max_attempts = match get("FITBIT_MAX_ATTEMPTS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    FitbitError::Config(format!("FITBIT_MAX_ATTEMPTS invalid: {raw}"))
                })?,
            None => DEFAULT_MAX_ATTEMPTS,
        };

        Ok(Self {
            client_id,
            client_secret: SecretString::new(client_secret.into()),
            api_uri: api_uri.trim_end_matches('/').to_string(),
            language,
            token_file,
            bootstrap_refresh_token,
            max_attempts,
        })
    }

    /// Token endpoint derived from the API root.
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.api_uri)
    }
}
