use std::fmt;

use reqwest::header;
use serde::Deserialize;

use super::{Error, Result, TeslaApi};

static OAUTH_PATH: &str = "/oauth/token";

/// Account and application credentials for the password grant.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A bearer token, either returned by the token endpoint or supplied by the caller.
///
/// Expiry is recorded when the server reports it but never acted on.
#[derive(Deserialize, Clone, PartialEq)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("created_at", &self.created_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl From<String> for AccessToken {
    fn from(access_token: String) -> Self {
        Self {
            access_token,
            token_type: None,
            created_at: None,
            expires_in: None,
            refresh_token: None,
        }
    }
}

impl AccessToken {
    /// Build a [`reqwest::Client`] that supplies this token in request headers.
    pub(crate) fn build_client(&self, user_agent: &str) -> Result<reqwest::Client> {
        let mut headers = header::HeaderMap::new();
        let mut auth_value =
            header::HeaderValue::from_str(&format!("Bearer {}", self.access_token))
                .map_err(|_| Error::InvalidToken)?;
        auth_value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth_value);

        Ok(reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?)
    }
}

impl TeslaApi {
    /// Exchange the account credentials for a token.
    #[tracing::instrument(skip(self))]
    pub(crate) async fn password_grant(&self) -> Result<AccessToken> {
        let creds = self.credentials();
        let form = [
            ("grant_type", "password"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("email", creds.email.as_str()),
            ("password", creds.password.as_str()),
        ];

        let request = self
            .http()
            .post(self.url(OAUTH_PATH))
            .query(&[("grant_type", "password")])
            .form(&form)
            .build()
            .map_err(Error::Authentication)?;

        let body = self
            .send(request)
            .await
            .and_then(|rsp| rsp.error_for_status())
            .map_err(Error::Authentication)?
            .bytes()
            .await
            .map_err(Error::Authentication)?;

        let token = serde_json::from_slice::<AccessToken>(&body).map_err(|source| {
            Error::Protocol {
                path: OAUTH_PATH.to_string(),
                source,
            }
        })?;

        tracing::debug!(?token, "obtained access token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            client_id: "id".to_string(),
            client_secret: "hunter2-secret".to_string(),
            email: "driver@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn debug_output_hides_secrets() {
        let out = format!("{:?}", creds());
        assert!(out.contains("driver@example.com"));
        assert!(!out.contains("hunter2"));

        let token = AccessToken::from("very-secret-token".to_string());
        assert!(!format!("{:?}", token).contains("very-secret-token"));
    }

    #[test]
    fn token_response_tolerates_missing_fields() {
        let token: AccessToken = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token, AccessToken::from("abc".to_string()));

        let token: AccessToken = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "bearer", "expires_in": 3888000,
                "refresh_token": "def", "created_at": 1600000000}"#,
        )
        .unwrap();
        assert_eq!(token.expires_in, Some(3888000));
        assert_eq!(token.refresh_token.as_deref(), Some("def"));
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let token = AccessToken::from("abc\ndef".to_string());
        assert!(matches!(
            token.build_client("test"),
            Err(Error::InvalidToken)
        ));
    }
}
