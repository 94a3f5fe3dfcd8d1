//! Cache-first request interception with network fallback.
//!
//! The cache is read-only here: it is populated at install time and never
//! written back on a miss. Misses go straight to the network and failures
//! propagate unchanged, so an offline miss surfaces as the network error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::resource::CachedResource;
use crate::storage::Storage;

/// Default timeout for network fetches.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Served from the resource cache.
    Cache,
    /// Fetched live from the network.
    Network,
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A request the worker has been asked to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL of the resource.
    pub url: String,
    /// Uppercase HTTP method.
    pub method: String,
}

impl FetchRequest {
    /// Build a GET request for the given URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
        }
    }

    /// Build a request with an explicit method.
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.as_ref().to_uppercase(),
        }
    }

    /// Whether this is a GET request.
    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// A response served to a page, from cache or network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content type reported by the origin, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
    /// Where the response came from.
    pub source: ResponseSource,
}

impl FetchResponse {
    /// Build a cache-sourced response from a stored resource.
    #[must_use]
    pub fn from_resource(resource: &CachedResource) -> Self {
        Self {
            status: 200,
            content_type: resource.content_type.clone(),
            body: resource.body.clone(),
            source: ResponseSource::Cache,
        }
    }

    /// Whether the status code is in the success range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches resources from the network.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    /// Fetch the resource at `url`.
    ///
    /// A response with an error status is still a response; only transport
    /// failures are errors.
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// Network fetcher backed by an HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Create a fetcher around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let response = self.client.get(url).send().await.map_err(|source| Error::Fetch {
            url: url.to_string(),
            source,
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let body = response.bytes().await.map_err(|source| Error::Fetch {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchResponse {
            status,
            content_type,
            body: body.to_vec(),
            source: ResponseSource::Network,
        })
    }
}

/// Serves requests cache-first out of one cache version.
pub struct FetchInterceptor {
    cache_version: String,
    fetcher: Arc<dyn NetworkFetcher>,
}

impl FetchInterceptor {
    /// Create an interceptor serving from the given cache version.
    pub fn new(cache_version: impl Into<String>, fetcher: Arc<dyn NetworkFetcher>) -> Self {
        Self {
            cache_version: cache_version.into(),
            fetcher,
        }
    }

    /// The cache version requests are matched against.
    #[must_use]
    pub fn cache_version(&self) -> &str {
        &self.cache_version
    }

    /// Serve a request: cached resource if the URL matches, otherwise a live
    /// network fetch. Only GET requests are matched against the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache lookup fails or, on a miss, if the
    /// network fetch fails.
    pub async fn handle(&self, storage: &Storage, request: &FetchRequest) -> Result<FetchResponse> {
        if request.is_get() {
            if let Some(resource) = storage.get_resource(&self.cache_version, &request.url)? {
                debug!("Cache hit for {}", request.url);
                return Ok(FetchResponse::from_resource(&resource));
            }
        }

        debug!("Cache miss for {}, going to network", request.url);
        self.fetcher.fetch(&request.url).await
    }
}

impl std::fmt::Debug for FetchInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchInterceptor")
            .field("cache_version", &self.cache_version)
            .finish_non_exhaustive()
    }
}
