//! HTTP implementations of the storage and transmission capabilities.
//!
//! Both clients talk to a plain HTTP gateway in front of the real provider:
//!
//! - storage: `GET {endpoint}/{bucket}/{key}` returns the raw object
//! - transmission: `POST {endpoint}` with a `SendRawEmail`-shaped JSON body
//!
//! Optional bearer tokens are sent with every request.

use crate::config::{ConfigError, ENV_PREFIX};
use crate::ports::{
    MailTransport, ObjectStore, RawMessageRequest, SendReceipt, StoreError, TransportError,
};
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request timeout used unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn endpoint_from<F>(lookup: &F, name: &str) -> Result<(String, Option<String>), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |suffix: &str| {
        lookup(&format!("{ENV_PREFIX}{name}_{suffix}")).filter(|value| !value.trim().is_empty())
    };

    let key = format!("{ENV_PREFIX}{name}_ENDPOINT");
    let endpoint = get("ENDPOINT").ok_or_else(|| ConfigError::missing(key.clone()))?;
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(ConfigError::invalid(key, format!("'{endpoint}' is not an http(s) URL")));
    }

    Ok((endpoint.trim_end_matches('/').to_string(), get("TOKEN")))
}

/// Object storage reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpObjectStore {
    /// Creates a store for the gateway at `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Creates a store using an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `MAILFORWARD_STORAGE_ENDPOINT` and `MAILFORWARD_STORAGE_TOKEN`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (endpoint, token) = endpoint_from(&lookup, "STORAGE")?;
        let store = Self::new(endpoint);
        Ok(match token {
            Some(token) => store.with_token(token),
            None => store,
        })
    }

    /// The URL an object is read from.
    #[must_use]
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut request = self
            .client
            .get(self.object_url(bucket, key))
            .timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::not_found(bucket, key)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(StoreError::access_denied(bucket, key))
            }
            status if !status.is_success() => Err(StoreError::Transport(format!(
                "unexpected status {status} for {bucket}/{key}"
            ))),
            _ => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|err| StoreError::Transport(err.to_string()))?;
                Ok(body.to_vec())
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendRawBody<'a> {
    destinations: &'a [String],
    source: &'a str,
    raw_message: RawData,
}

#[derive(Debug, Serialize)]
struct RawData {
    #[serde(rename = "Data")]
    data: String,
}

#[derive(Debug, Deserialize)]
struct SendRawResponse {
    #[serde(rename = "MessageId")]
    message_id: String,
}

impl<'a> SendRawBody<'a> {
    fn new(request: &'a RawMessageRequest) -> Self {
        Self {
            destinations: &request.destinations,
            source: &request.source,
            raw_message: RawData {
                data: base64::engine::general_purpose::STANDARD.encode(&request.raw_message),
            },
        }
    }
}

/// Raw mail transmission over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMailTransport {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpMailTransport {
    /// Creates a transport posting to `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Creates a transport using an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `MAILFORWARD_TRANSMISSION_ENDPOINT` and `MAILFORWARD_TRANSMISSION_TOKEN`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (endpoint, token) = endpoint_from(&lookup, "TRANSMISSION")?;
        let transport = Self::new(endpoint);
        Ok(match token {
            Some(token) => transport.with_token(token),
            None => transport,
        })
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send_raw(&self, request: &RawMessageRequest) -> Result<SendReceipt, TransportError> {
        let mut http = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&SendRawBody::new(request));
        if let Some(token) = &self.token {
            http = http.bearer_auth(token);
        }

        let response = http
            .send()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: SendRawResponse = response
            .json()
            .await
            .map_err(|err| TransportError::Transport(format!("invalid response body: {err}")))?;
        Ok(SendReceipt {
            message_id: body.message_id,
        })
    }
}
