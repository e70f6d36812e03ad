use std::{fmt, time::Duration};

use bytes::Bytes;
use http::{
    Method, Request, StatusCode, Uri,
    header::{ACCEPT, AUTHORIZATION},
};
use http_body_util::{BodyExt, Full};
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use log::debug;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    connector::DialConnector,
    dial::{DialFn, default_dial_fn},
    endpoints::{API_SERVER_ENDPOINTS_PATH, Endpoints},
};

#[derive(Debug)]
pub enum ClientError {
    InvalidHost(String),
    UnsupportedScheme(String),
    Http(http::Error),
    Request(hyper_util::client::legacy::Error),
    Body(hyper::Error),
    Status(StatusCode),
    Timeout,
    Decode(serde_json::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::InvalidHost(host) => write!(f, "invalid host: {host:?}"),
            ClientError::UnsupportedScheme(scheme) => {
                write!(f, "unsupported scheme: {scheme} (only http is supported)")
            }
            ClientError::Http(err) => write!(f, "request build failed: {err}"),
            ClientError::Request(err) => write!(f, "request failed: {err}"),
            ClientError::Body(err) => write!(f, "reading body failed: {err}"),
            ClientError::Status(status) => write!(f, "unexpected status: {status}"),
            ClientError::Timeout => write!(f, "request timed out"),
            ClientError::Decode(err) => write!(f, "decoding response failed: {err}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Http(err) => Some(err),
            ClientError::Request(err) => Some(err),
            ClientError::Body(err) => Some(err),
            ClientError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

/// How to reach the load-balanced API endpoint. Cloning is the shallow copy:
/// the dial function is shared, every other field is owned.
#[derive(Clone, Default)]
pub struct ConnectionConfig {
    pub host: String, // "http://10.0.0.1:6443"
    pub bearer_token: Option<String>,
    pub timeout: Option<Duration>,
    pub dial: Option<DialFn>,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("dial", &self.dial.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub minor: String,
    #[serde(default)]
    pub git_version: String,
    #[serde(default)]
    pub platform: String,
}

/// Minimal API-server client. Every connection it opens goes through the
/// configured dial function.
#[derive(Clone)]
pub struct ClusterClient {
    client: Client<DialConnector, Full<Bytes>>,
    base: String,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
}

impl ClusterClient {
    /// Builds the client without touching the network.
    pub fn new_for_config(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let base = config.host.trim_end_matches('/');
        let uri: Uri = base
            .parse()
            .map_err(|_| ClientError::InvalidHost(config.host.clone()))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(ClientError::UnsupportedScheme(other.to_string())),
            None => return Err(ClientError::InvalidHost(config.host.clone())),
        }
        if uri.host().is_none_or(str::is_empty) {
            return Err(ClientError::InvalidHost(config.host.clone()));
        }

        let dial = config.dial.clone().unwrap_or_else(default_dial_fn);
        let client = Client::builder(TokioExecutor::new()).build(DialConnector::new(dial));

        Ok(Self {
            client,
            base: base.to_string(),
            bearer_token: config.bearer_token.clone(),
            timeout: config.timeout,
        })
    }

    pub fn host(&self) -> &str {
        &self.base
    }

    pub async fn get(&self, path: &str) -> Result<Bytes, ClientError> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(format!("{}{}", self.base, path))
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.bearer_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder
            .body(Full::new(Bytes::new()))
            .map_err(ClientError::Http)?;

        let send = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(ClientError::Request)?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(ClientError::Body)?
                .to_bytes();

            if !status.is_success() {
                return Err(ClientError::Status(status));
            }
            Ok(body)
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, send)
                .await
                .map_err(|_| ClientError::Timeout)?,
            None => send.await,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let body = self.get(path).await?;
        serde_json::from_slice(&body).map_err(ClientError::Decode)
    }

    pub async fn version(&self) -> Result<VersionInfo, ClientError> {
        self.get_json("/version").await
    }

    /// Addresses of the API servers currently registered in the cluster.
    pub async fn api_server_endpoints(&self) -> Result<Vec<String>, ClientError> {
        let endpoints: Endpoints = self.get_json(API_SERVER_ENDPOINTS_PATH).await?;
        let addresses = endpoints.addresses();
        debug!("{} lists {} API server endpoints", self.base, addresses.len());
        Ok(addresses)
    }
}
