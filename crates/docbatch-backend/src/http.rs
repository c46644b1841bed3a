//! HTTP implementation of `MultiGetClient` against an `_mget` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{BackendError, BackendResult};
use crate::traits::{MultiGetClient, MultiGetReply, MultiGetRequest};

/// Connection settings for `HttpMultiGetClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the cluster, e.g. `http://localhost:9200`.
    pub url: String,
    /// Basic auth user name.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 30,
        }
    }
}

/// Multi-get client speaking HTTP to an OpenSearch/Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct HttpMultiGetClient {
    client: Client,
    mget_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpMultiGetClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the URL is empty or the underlying HTTP
    /// client cannot be constructed.
    pub fn new(config: &HttpClientConfig) -> BackendResult<Self> {
        let base = config.url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(BackendError::InvalidConfig {
                message: "url cannot be empty".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::InvalidConfig {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            mget_url: format!("{base}/_mget"),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// The `_mget` endpoint this client posts to.
    pub fn mget_url(&self) -> &str {
        &self.mget_url
    }
}

fn classify(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout {
            message: err.to_string(),
        }
    } else if err.is_connect() {
        BackendError::Connection {
            message: err.to_string(),
        }
    } else {
        BackendError::Request {
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl MultiGetClient for HttpMultiGetClient {
    #[instrument(skip(self, request), fields(docs = request.docs.len()))]
    async fn multi_get(&self, request: &MultiGetRequest) -> BackendResult<MultiGetReply> {
        let mut query: Vec<(&str, String)> = Vec::with_capacity(2);
        if let Some(preference) = &request.preference {
            query.push(("preference", preference.clone()));
        }
        if let Some(realtime) = request.realtime {
            query.push(("realtime", realtime.to_string()));
        }

        let mut req = self.client.post(&self.mget_url).query(&query).json(request);
        if let Some(username) = &self.username {
            req = req.basic_auth(username, self.password.as_deref());
        }

        let response = req.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;

        debug!(status, bytes = body.len(), "multi-get reply received");

        Ok(MultiGetReply::new(status, body.to_vec()))
    }
}
