use reqwest::{Method, Request, Response};
use serde::Deserialize;
use serde_json::Value;

use super::{
    AccessToken, Credentials, Error, Result, RetryPolicy, Vehicle, VehicleSummary, BASE_URL,
};

static DEFAULT_USER_AGENT: &str = concat!("tesla-owner-api/", env!("CARGO_PKG_VERSION"));

/// An authenticated session against the owner API.
///
/// Construction makes no network calls; call [`TeslaApi::initialize`] to
/// obtain or adopt a token before listing vehicles. The base URL is fixed
/// for the lifetime of the client.
#[derive(Debug)]
pub struct TeslaApi {
    credentials: Credentials,
    base_url: String,
    user_agent: String,
    retry: RetryPolicy,
    token: Option<AccessToken>,
    // rebuilt with the bearer header once a token is known
    http: reqwest::Client,
}

/// Builder for [`TeslaApi`] with a non-default host, user agent or retry policy.
#[derive(Debug)]
pub struct TeslaApiBuilder {
    credentials: Credentials,
    base_url: String,
    user_agent: String,
    retry: RetryPolicy,
}

impl TeslaApiBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<TeslaApi> {
        let http = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .build()?;

        Ok(TeslaApi {
            credentials: self.credentials,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            user_agent: self.user_agent,
            retry: self.retry,
            token: None,
            http,
        })
    }
}

impl TeslaApi {
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::builder(credentials).build()
    }

    pub fn builder(credentials: Credentials) -> TeslaApiBuilder {
        TeslaApiBuilder {
            credentials,
            base_url: BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Authenticate the session.
    ///
    /// With a non-empty `Some(token)` the token is adopted as-is and no request
    /// is made. Otherwise a password grant is performed with the stored
    /// credentials.
    /// Either way, every later request carries `Authorization: Bearer <token>`.
    #[tracing::instrument(skip(self, access_token), fields(supplied = access_token.is_some()))]
    pub async fn initialize(&mut self, access_token: Option<&str>) -> Result<()> {
        let token = match access_token.filter(|t| !t.is_empty()) {
            Some(token) => AccessToken::from(token.to_string()),
            None => self.password_grant().await?,
        };

        self.http = token.build_client(&self.user_agent)?;
        self.token = Some(token);
        tracing::info!("session initialized");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The bearer token in use, once initialized.
    pub fn access_token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.access_token.as_str())
    }

    /// The full token response, when the token came from the token endpoint.
    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> std::result::Result<Response, reqwest::Error> {
        self.request(Method::GET, self.url(path), None).await
    }

    pub async fn post(
        &self,
        path: &str,
        json: Option<&Value>,
    ) -> std::result::Result<Response, reqwest::Error> {
        self.request(Method::POST, self.url(path), json).await
    }

    pub async fn patch(
        &self,
        path: &str,
        json: Option<&Value>,
    ) -> std::result::Result<Response, reqwest::Error> {
        self.request(Method::PATCH, self.url(path), json).await
    }

    /// Issue a request against an absolute URL under the retry policy.
    pub(crate) async fn request(
        &self,
        method: Method,
        url: String,
        json: Option<&Value>,
    ) -> std::result::Result<Response, reqwest::Error> {
        let mut builder = self.http.request(method, url);
        if let Some(json) = json {
            builder = builder.json(json);
        }
        self.send(builder.build()?).await
    }

    /// Execute `request`, retrying transient failures.
    ///
    /// When the retry budget runs out the last response or error is returned
    /// unchanged; the caller decides how to classify it.
    pub(crate) async fn send(
        &self,
        request: Request,
    ) -> std::result::Result<Response, reqwest::Error> {
        let mut retries = 0;
        loop {
            let attempt = match request.try_clone() {
                Some(attempt) => attempt,
                None => return self.http.execute(request).await,
            };
            metrics::counter!("tesla_api_requests", 1);

            let outcome = self.http.execute(attempt).await;
            let retry = retries < self.retry.max_retries
                && match &outcome {
                    Ok(rsp) => self.retry.retries_status(rsp.status()),
                    Err(e) => self.retry.retries_error(e),
                };
            if !retry {
                return outcome;
            }

            retries += 1;
            let wait = self.retry.backoff(retries);
            match &outcome {
                Ok(rsp) => tracing::warn!(
                    url = %request.url(),
                    status = %rsp.status(),
                    retry = retries,
                    ?wait,
                    "transient failure, retrying"
                ),
                Err(e) => tracing::warn!(
                    url = %request.url(),
                    error = %e,
                    retry = retries,
                    ?wait,
                    "transient failure, retrying"
                ),
            }
            metrics::counter!("tesla_api_retries", 1);
            tokio::time::sleep(wait).await;
        }
    }

    /// Handle for a vehicle whose identifier is already known.
    pub fn vehicle(&self, id: u64) -> Vehicle<'_> {
        Vehicle::new(id, self)
    }

    /// List the vehicles on the account, one handle per vehicle.
    #[tracing::instrument(skip(self))]
    pub async fn list_vehicles(&self) -> Result<Vec<Vehicle<'_>>> {
        static PATH: &str = "/api/1/vehicles";

        #[derive(Deserialize)]
        struct Response {
            response: Vec<VehicleSummary>,
        }

        let body = self
            .get(PATH)
            .await
            .and_then(|rsp| rsp.error_for_status())
            .map_err(|source| Error::Command {
                path: PATH.to_string(),
                source,
            })?
            .bytes()
            .await
            .map_err(|source| Error::Command {
                path: PATH.to_string(),
                source,
            })?;

        let vehicles = serde_json::from_slice::<Response>(&body)
            .map_err(|source| Error::Protocol {
                path: PATH.to_string(),
                source,
            })?
            .response;
        tracing::debug!(count = vehicles.len(), "listed vehicles");

        Ok(vehicles
            .into_iter()
            .map(|summary| Vehicle::with_summary(summary, self))
            .collect())
    }
}
