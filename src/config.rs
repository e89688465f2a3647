use std::{fmt, time::Duration};

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

use crate::tesla::{self, Credentials, RetryPolicy, TeslaApi};

pub trait Validate: Sized {
    fn validate(self) -> Result<Self, Error>;
}

#[derive(Default, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub tesla_credentials: TeslaCredentials,
    pub api: Api,
}

#[derive(Serialize, Deserialize, Clone, Eq, PartialEq)]
pub struct TeslaCredentials {
    pub email: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    /// Skips the password grant when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Api {
    pub base_url: String,
    pub user_agent: String,
    pub retry: Retry,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Retry {
    pub max_retries: u32,
    pub backoff_factor_ms: u64,
    pub max_backoff_ms: u64,
    pub status_forcelist: Vec<u16>,
}

impl Config {
    /// Overlay `TESLA_*` environment variables on top of the file contents.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // an exported but empty variable does not override
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let creds = &mut self.tesla_credentials;
        if let Some(email) = lookup("TESLA_EMAIL") {
            creds.email = email;
        }
        if let Some(password) = lookup("TESLA_PASSWORD") {
            creds.password = password;
        }
        if let Some(client_id) = lookup("TESLA_CLIENT_ID") {
            creds.client_id = client_id;
        }
        if let Some(client_secret) = lookup("TESLA_CLIENT_SECRET") {
            creds.client_secret = client_secret;
        }
        if let Some(token) = lookup("TESLA_ACCESS_TOKEN") {
            creds.access_token = Some(token);
        }
        self
    }

    /// Build an unauthenticated client from this configuration.
    pub fn client(&self) -> Result<TeslaApi, tesla::Error> {
        TeslaApi::builder(self.tesla_credentials.credentials())
            .base_url(self.api.base_url.as_str())
            .user_agent(self.api.user_agent.as_str())
            .retry_policy(self.api.retry.policy())
            .build()
    }
}

impl TeslaCredentials {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for TeslaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeslaCredentials")
            .field("email", &self.email)
            .field("client_id", &self.client_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Retry {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_factor: Duration::from_millis(self.backoff_factor_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            status_forcelist: self.status_forcelist.clone(),
        }
    }
}

impl Validate for Config {
    fn validate(self) -> Result<Self, Error> {
        Ok(Self {
            tesla_credentials: self.tesla_credentials.validate()?,
            api: self.api.validate()?,
        })
    }
}

impl Validate for TeslaCredentials {
    fn validate(self) -> Result<Self, Error> {
        if self.access_token.as_deref().map_or(false, |t| !t.is_empty()) {
            return Ok(self);
        }
        if self == Self::default() {
            return Err(anyhow!(
                "tesla credentials must be changed from default values"
            ));
        }
        Ok(self)
    }
}

impl Validate for Api {
    fn validate(self) -> Result<Self, Error> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(anyhow!(
                "base_url {:?} must be an http(s) URL",
                self.base_url
            ));
        }
        Ok(Self {
            retry: self.retry.validate()?,
            ..self
        })
    }
}

impl Validate for Retry {
    fn validate(self) -> Result<Self, Error> {
        if self.status_forcelist.is_empty() {
            return Err(anyhow!("retry status_forcelist must not be empty"));
        }
        if self.backoff_factor_ms > self.max_backoff_ms {
            return Err(anyhow!(
                "backoff_factor_ms {} exceeds max_backoff_ms {}",
                self.backoff_factor_ms,
                self.max_backoff_ms
            ));
        }
        Ok(self)
    }
}

impl Default for TeslaCredentials {
    fn default() -> Self {
        TeslaCredentials {
            email: "your_tesla_email".to_string(),
            password: "your_tesla_password".to_string(),
            client_id: "your_tesla_client_id".to_string(),
            client_secret: "your_tesla_client_secret".to_string(),
            access_token: None,
        }
    }
}

impl Default for Api {
    fn default() -> Self {
        Api {
            base_url: tesla::default_base_url().to_string(),
            user_agent: concat!("tesla-owner-api/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: Retry::default(),
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Retry {
            max_retries: policy.max_retries,
            backoff_factor_ms: policy.backoff_factor.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            status_forcelist: policy.status_forcelist,
        }
    }
}
