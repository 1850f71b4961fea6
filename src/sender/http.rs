use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::header::{self, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[cfg(test)]
use mockall::automock;

/// Value sent in the `User-Agent` header of every batch request.
pub const USER_AGENT: &str = concat!("logship/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("endpoint rejected batch: HTTP {status}")]
    Http { status: u16 },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Connection pool tuning for the default HTTP stack.
///
/// Defaults match the keep-alive agent the service has always used: up to
/// ten idle sockets per host, closed after a minute unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Upper bound on idle sockets kept alive per host.
    pub max_idle_per_host: usize,
    /// How long an idle pooled socket survives before being closed.
    pub idle_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Builds the default pooled client used when the caller does not supply
/// their own.
pub fn build_pooled_client(
    pool: &PoolOptions,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(request_timeout)
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .pool_idle_timeout(pool.idle_timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// The one network capability the transport needs: deliver an encoded batch
/// body, report the resulting HTTP status.
///
/// Substituting this swaps the entire HTTP stack without touching any
/// batching logic: tests install capturing doubles, callers with bespoke
/// TLS or proxy needs install their own implementation.
#[cfg_attr(test, automock)]
pub trait HttpSender: Send + Sync {
    fn send(&self, body: Bytes) -> BoxFuture<'static, Result<u16, TransmissionError>>;
}

/// Production sender: one `POST {endpoint}` per batch over the pooled
/// `reqwest` client, HTTP Basic auth with the API key as username and an
/// empty password.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: Client,
    endpoint: Url,
    api_key: String,
    request_timeout: Duration,
}

impl ReqwestSender {
    pub fn new(
        client: Client,
        endpoint: Url,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
            request_timeout,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl HttpSender for ReqwestSender {
    fn send(&self, body: Bytes) -> BoxFuture<'static, Result<u16, TransmissionError>> {
        // Built synchronously so the request is considered issued the moment
        // the caller hands the body over; only the response wait is deferred.
        let request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(CONTENT_LENGTH, body.len())
            .header(header::USER_AGENT, HeaderValue::from_static(USER_AGENT))
            .basic_auth(&self.api_key, Some(""))
            .timeout(self.request_timeout)
            .body(body);
        let request_timeout = self.request_timeout;

        Box::pin(async move {
            let response = request.send().await.map_err(|err| {
                if err.is_timeout() {
                    TransmissionError::Timeout(request_timeout)
                } else {
                    TransmissionError::Network(err)
                }
            })?;

            let status = response.status();
            if status.is_success() {
                Ok(status.as_u16())
            } else {
                // Response bodies are never read; the status is all we act on.
                Err(TransmissionError::Http {
                    status: status.as_u16(),
                })
            }
        })
    }
}
