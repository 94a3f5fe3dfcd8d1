//! REST boundary client for the ordering backend.
//!
//! One thin client covers every backend call: JSON helpers for the four
//! verbs plus a raw upload, with bearer and tenant headers attached once
//! credentials are set. A 401 from any endpoint maps to
//! [`ApiError::Unauthorized`] carrying the login path so the caller can
//! redirect. Nothing here retries; the only timeouts are the fixed ones on
//! the two HTTP clients.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Path the caller redirects to after a 401.
pub const LOGIN_PATH: &str = "/login";

/// Header carrying the tenant id of the session.
pub const TENANT_HEADER: &str = "x-tenant-id";

const STANDARD_TIMEOUT_SECS: u64 = 30;
const UPLOAD_TIMEOUT_SECS: u64 = 60;

/// Errors from the REST boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend no longer accepts the session.
    #[error("not authorized, redirect to {login_path}")]
    Unauthorized {
        /// Where the caller should send the user.
        login_path: &'static str,
    },

    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// URL that was requested.
        url: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("request to {url} returned status {status}")]
    Status {
        /// URL that was requested.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not the expected JSON.
    #[error("response from {url} did not decode: {source}")]
    Decode {
        /// URL that was requested.
        url: String,
        /// Underlying decode error.
        source: reqwest::Error,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ApiError {
    /// Path the user should be sent to, when the error calls for a redirect.
    #[must_use]
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            Self::Unauthorized { login_path } => Some(login_path),
            _ => None,
        }
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Bearer token and tenant of an authenticated session.
#[derive(Clone)]
pub struct Credentials {
    /// Token presented on every request.
    pub token: String,
    /// Tenant (store) the session belongs to.
    pub tenant_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

/// JSON client for the ordering backend.
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    upload_client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl ApiClient {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(STANDARD_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::Build)?;
        // Uploads get a longer window than ordinary JSON calls
        let upload_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::Build)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            upload_client,
            credentials: None,
        })
    }

    /// Create a client that holds session credentials from the start.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn with_credentials(
        base_url: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self> {
        let mut client = Self::new(base_url)?;
        client.credentials = Some(credentials);
        Ok(client)
    }

    /// Set or clear the session credentials.
    pub fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials;
    }

    /// Whether requests will carry auth headers.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// The backend base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// body that does not decode.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let builder = self.client.get(&url);
        self.send(url, builder).await
    }

    /// POST `body` as JSON to `path` and decode the response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// body that does not decode.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let builder = self.client.post(&url).json(body);
        self.send(url, builder).await
    }

    /// PUT `body` as JSON to `path` and decode the response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// body that does not decode.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let builder = self.client.put(&url).json(body);
        self.send(url, builder).await
    }

    /// DELETE `path` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// body that does not decode.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let builder = self.client.delete(&url);
        self.send(url, builder).await
    }

    /// POST raw bytes to `path` with the upload timeout.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// body that does not decode.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<T> {
        let url = self.url(path);
        let builder = self
            .upload_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        self.send(url, builder).await
    }

    /// Join `path` onto the base URL with exactly one slash.
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(credentials) => builder
                .bearer_auth(&credentials.token)
                .header(TENANT_HEADER, credentials.tenant_id.as_str()),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: String,
        builder: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self
            .apply_auth(builder)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            debug!("Backend rejected the session for {}", url);
            return Err(ApiError::Unauthorized {
                login_path: LOGIN_PATH,
            });
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            token: "tok-123".to_string(),
            tenant_id: "loja-7".to_string(),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("https://api.meuapetite.app/").unwrap();
        assert_eq!(client.base_url(), "https://api.meuapetite.app");
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("https://api.meuapetite.app").unwrap();
        assert_eq!(client.url("/orders"), "https://api.meuapetite.app/orders");
        assert_eq!(client.url("orders"), "https://api.meuapetite.app/orders");
    }

    #[test]
    fn test_authenticated_requests_carry_headers() {
        let client =
            ApiClient::with_credentials("https://api.meuapetite.app", credentials()).unwrap();
        assert!(client.is_authenticated());

        let request = client
            .apply_auth(client.client.get(client.url("/orders")))
            .build()
            .unwrap();
        let auth = request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer tok-123");
        let tenant = request.headers().get(TENANT_HEADER).unwrap();
        assert_eq!(tenant.to_str().unwrap(), "loja-7");
    }

    #[test]
    fn test_unauthenticated_requests_are_bare() {
        let client = ApiClient::new("https://api.meuapetite.app").unwrap();
        let request = client
            .apply_auth(client.client.get(client.url("/orders")))
            .build()
            .unwrap();
        assert!(request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .is_none());
        assert!(request.headers().get(TENANT_HEADER).is_none());
    }

    #[test]
    fn test_set_credentials_toggles_auth() {
        let mut client = ApiClient::new("https://api.meuapetite.app").unwrap();
        assert!(!client.is_authenticated());

        client.set_credentials(Some(credentials()));
        assert!(client.is_authenticated());

        client.set_credentials(None);
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_unauthorized_carries_login_path() {
        let err = ApiError::Unauthorized {
            login_path: LOGIN_PATH,
        };
        assert_eq!(err.redirect_path(), Some("/login"));
        assert!(err.to_string().contains("/login"));
    }

    #[test]
    fn test_other_errors_have_no_redirect() {
        let err = ApiError::Status {
            url: "https://api.meuapetite.app/orders".to_string(),
            status: 500,
        };
        assert!(err.redirect_path().is_none());
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let debug = format!("{:?}", credentials());
        assert!(debug.contains("loja-7"));
        assert!(!debug.contains("tok-123"));
    }

    #[test]
    fn test_client_debug() {
        let client = ApiClient::new("https://api.meuapetite.app").unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("api.meuapetite.app"));
    }
}
