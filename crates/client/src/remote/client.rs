//! Shared HTTP plumbing for the storefront API.

use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use url::Url;

use basket_core::wire::ErrorBody;

use crate::config::ClientConfig;
use crate::remote::RemoteError;
use crate::session::SessionState;

/// Number of body characters kept in logs and error messages.
const BODY_PREVIEW_CHARS: usize = 200;

/// Client for the storefront REST API.
///
/// Cheap to clone; all clones share one connection pool and observe the same
/// session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: watch::Receiver<SessionState>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(
        config: &ClientConfig,
        session: watch::Receiver<SessionState>,
    ) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .user_agent(concat!("basket/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                session,
            }),
        })
    }

    /// Build a request, attaching the session token when there is one.
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
        let request = self.unauthenticated(method, path)?;
        Ok(match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    /// Build a request that requires an authenticated session.
    pub(crate) fn authenticated(
        &self,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, RemoteError> {
        let token = self.token().ok_or(RemoteError::NotAuthenticated)?;
        Ok(self.unauthenticated(method, path)?.bearer_auth(token))
    }

    /// Build a request without credentials.
    pub(crate) fn unauthenticated(
        &self,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, RemoteError> {
        let url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| RemoteError::Parse(format!("invalid request path {path:?}: {e}")))?;
        Ok(self.inner.client.request(method, url))
    }

    fn token(&self) -> Option<String> {
        self.inner
            .session
            .borrow()
            .token()
            .map(|t| t.expose_secret().to_owned())
    }

    /// Send a request and return the body of a successful response.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let preview = preview(&body);
        tracing::warn!(
            status = %status,
            body = %preview,
            "Storefront API returned non-success status"
        );

        let message = serde_json::from_str::<ErrorBody>(&body)
            .map_or(preview, |b| b.message);
        Err(match status {
            StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
            StatusCode::NOT_FOUND => RemoteError::NotFound(message),
            _ => RemoteError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Send a request and decode a JSON response body.
    pub(crate) async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %preview(&body),
                "Failed to parse storefront API response"
            );
            RemoteError::Parse(e.to_string())
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;

    #[test]
    fn test_preview_truncates_by_chars() {
        let body = "é".repeat(500);
        assert_eq!(preview(&body).chars().count(), BODY_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[tokio::test]
    async fn test_authenticated_request_requires_session() {
        let config = ClientConfig::for_api_url("http://127.0.0.1:9/api").unwrap();
        let session = SessionHandle::new();
        let client = ApiClient::new(&config, session.subscribe()).unwrap();

        let err = client
            .authenticated(Method::GET, "cart/items")
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotAuthenticated));

        let request = client
            .request(Method::GET, "products/1")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://127.0.0.1:9/api/products/1");
        assert!(request.headers().get("authorization").is_none());
    }
}
