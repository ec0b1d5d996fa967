use std::time::Duration;

use anyhow::Context;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use super::oauth::OAuthCredentials;
use super::StoreError;

const USER_AGENT: &str = concat!("photomigrate/", env!("CARGO_PKG_VERSION"));

/// How requests to an API are authenticated.
#[derive(Clone)]
pub(crate) enum Auth {
    Anonymous,
    Bearer(String),
    OAuth1(OAuthCredentials),
}

/// Thin wrapper over `reqwest::Client` shared by the HTTP stores.
///
/// Authenticates API requests, and turns transport failures, error statuses
/// and undecodable bodies into [`StoreError`] kinds so callers never see a
/// raw `reqwest::Error`.
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: Client,
    auth: Auth,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.auth {
            Auth::Anonymous => "anonymous",
            Auth::Bearer(_) => "bearer <redacted>",
            Auth::OAuth1(_) => "oauth1 <redacted>",
        };
        f.debug_struct("ApiClient")
            .field("auth", &auth)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// `timeout` bounds every read from the socket, so a transfer that
    /// stalls mid-body fails (and can be retried) instead of hanging.
    pub(crate) fn new(auth: Auth, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, auth })
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub(crate) fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// GET without any credentials, for URLs outside the API.
    pub(crate) fn get_anonymous(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method.clone(), url);
        match &self.auth {
            Auth::Anonymous => builder,
            Auth::Bearer(token) => builder.bearer_auth(token),
            // An unparsable URL fails in `send` anyway.
            Auth::OAuth1(creds) => match Url::parse(url) {
                Ok(parsed) => {
                    builder.header(AUTHORIZATION, creds.authorization(&method, &parsed))
                }
                Err(_) => builder,
            },
        }
    }

    /// Send a request, failing on any non-success status.
    pub(crate) async fn send(
        &self,
        builder: RequestBuilder,
        url: &str,
    ) -> Result<Response, StoreError> {
        tracing::debug!(url, "request");
        let response = builder.send().await.map_err(|e| StoreError::Connection {
            source: e,
            url: url.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::from_status(status.as_u16(), url));
        }
        Ok(response)
    }

    /// Send a request and decode its JSON body.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        url: &str,
    ) -> Result<T, StoreError> {
        let response = self.send(builder, url).await?;
        let body = response.bytes().await.map_err(|e| StoreError::Connection {
            source: e,
            url: url.to_string(),
        })?;
        decode(&body, url)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &[u8], url: &str) -> Result<T, StoreError> {
    serde_json::from_slice(body).map_err(|e| StoreError::unexpected(url, e))
}
