//! HTTP client with connection pooling and retry logic

use rawpull_errors::{Error, NetworkError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, IF_NONE_MATCH};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // 5 minutes for large images
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            user_agent: format!("rawpull/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created due to invalid configuration
    /// or if the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NetworkError::ConnectionRefused(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with default settings.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(NetConfig::default())
    }

    /// Execute a GET request with retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retry attempts.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        self.retry_request(url, || self.client.get(url).send()).await
    }

    /// Execute a conditional GET, sending `If-None-Match` when a cached ETag
    /// is known. A `304 Not Modified` response is returned to the caller
    /// rather than treated as an error; the download state machine decides
    /// what a 304 means (short-circuit to `Done` without touching bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retry attempts or the
    /// ETag cannot be encoded as a header value.
    pub async fn get_conditional(
        &self,
        url: &str,
        if_none_match: Option<&str>,
    ) -> Result<Response, Error> {
        let mut headers = HeaderMap::new();
        if let Some(etag) = if_none_match {
            let value = HeaderValue::from_str(etag)
                .map_err(|e| NetworkError::InvalidUrl(format!("invalid cached ETag: {e}")))?;
            headers.insert(IF_NONE_MATCH, value);
        }

        self.retry_request(url, || {
            self.client.get(url).headers(headers.clone()).send()
        })
        .await
    }

    /// Execute a HEAD request with retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retry attempts.
    pub async fn head(&self, url: &str) -> Result<Response, Error> {
        self.retry_request(url, || self.client.head(url).send())
            .await
    }

    /// Execute a request with retries. A `304 Not Modified` or `2xx` response
    /// is always returned to the caller as `Ok`; only transport failures and
    /// rate limiting are treated as retryable/terminal errors here.
    async fn retry_request<F, Fut>(&self, url: &str, mut f: F) -> Result<Response, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay * attempt).await;
            }

            match f().await {
                Ok(response) => {
                    if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        if let Some(retry_after) = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                        {
                            return Err(NetworkError::RateLimited {
                                seconds: retry_after,
                            }
                            .into());
                        }
                    }

                    if response.status().is_informational() {
                        return Err(NetworkError::UnexpectedInformational {
                            status: response.status().as_u16(),
                            url: url.to_string(),
                        }
                        .into());
                    }

                    return Ok(response);
                }
                Err(e) => {
                    let retry = Self::should_retry(&e);
                    last_error = Some(e);
                    if !retry {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) if e.is_timeout() => Err(NetworkError::Timeout {
                url: url.to_string(),
            }
            .into()),
            Some(e) if e.is_connect() => Err(NetworkError::ConnectionRefused(e.to_string()).into()),
            Some(e) => Err(NetworkError::DownloadFailed(e.to_string()).into()),
            None => Err(NetworkError::DownloadFailed("unknown error".to_string()).into()),
        }
    }

    /// Determine if an error should be retried
    fn should_retry(error: &reqwest::Error) -> bool {
        error.is_timeout()
            || error.is_connect()
            || error.status().is_none_or(|s| s.is_server_error())
    }

    /// Get the underlying reqwest client for advanced usage
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Extract a validator header from a response, if present.
pub(crate) fn header_str<'a>(response: &'a Response, name: &'static str) -> Option<&'a str> {
    response
        .headers()
        .get(HeaderName::from_static(name))
        .and_then(|v| v.to_str().ok())
}
