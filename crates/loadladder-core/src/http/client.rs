use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::LadderConfig;
use crate::error::LadderError;
use crate::results::{elapsed_millis, Sample};

/// Performs one request against one endpoint and reports it as a [`Sample`].
///
/// Implementations must never fail: every transport problem becomes a
/// sample with `status_code == 0`.
pub trait RequestExecutor: Send + Sync + 'static {
    fn execute(&self, endpoint: &str, worker_id: u32) -> impl Future<Output = Sample> + Send;
}

/// Network-backed [`RequestExecutor`] sharing one reqwest connection pool.
pub struct HttpExecutor {
    inner: reqwest::Client,
    base_url: String,
}

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Builder for [`HttpExecutor`].
pub struct HttpExecutorBuilder {
    base_url: String,
    timeout: Duration,
    pool_max_idle_per_host: usize,
    danger_accept_invalid_certs: bool,
}

impl HttpExecutorBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 100,
            danger_accept_invalid_certs: false,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, n: usize) -> Self {
        self.pool_max_idle_per_host = n;
        self
    }

    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> Result<HttpExecutor, LadderError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(concat!("loadladder/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(HttpExecutor {
            inner: client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl HttpExecutor {
    pub fn builder(base_url: impl Into<String>) -> HttpExecutorBuilder {
        HttpExecutorBuilder::new(base_url)
    }

    /// Build an executor with the timeout, pool and TLS settings of `config`.
    pub fn from_config(config: &LadderConfig) -> Result<Self, LadderError> {
        Self::builder(config.base_url())
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the GET and read the full body; returns status and body size.
    async fn fetch(&self, url: &str) -> Result<(u16, u64), reqwest::Error> {
        let response = self.inner.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok((status, body.len() as u64))
    }
}

impl RequestExecutor for HttpExecutor {
    async fn execute(&self, endpoint: &str, worker_id: u32) -> Sample {
        let url = format!("{}{}", self.base_url, endpoint);
        let issued_at = Utc::now();
        let start = Instant::now();

        let outcome = self.fetch(&url).await;
        let elapsed_ms = elapsed_millis(start.elapsed());

        match outcome {
            Ok((status, size_bytes)) => Sample::response(
                issued_at, elapsed_ms, endpoint, url, worker_id, status, size_bytes,
            ),
            Err(err) => {
                tracing::debug!(worker_id, %url, elapsed_ms, "request failed: {err}");
                Sample::transport_failure(issued_at, elapsed_ms, endpoint, url, worker_id)
            }
        }
    }
}
