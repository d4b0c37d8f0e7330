//! Builtin request adapters: host matching and bearer-token authorization.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use http::HeaderName;
use http::HeaderValue;
use http::header::AUTHORIZATION;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::adapters::RequestAdapter;
use crate::error::RequestEncodingError;
use crate::error::Result;
use crate::error::SundayError;
use crate::request::HttpRequest;
use crate::request_factory::RequestFactory;

/// Wraps another adapter, delegating only for requests whose host is in the
/// configured set. Hostnames match case-insensitively and exactly.
pub struct HostMatchingAdapter {
    delegate: Arc<dyn RequestAdapter>,
    hosts: Vec<String>,
}

impl HostMatchingAdapter {
    /// Wrap `delegate`, applying it only to the given hosts.
    pub fn new(delegate: Arc<dyn RequestAdapter>, hosts: impl IntoIterator<Item = String>) -> Self {
        HostMatchingAdapter {
            delegate,
            hosts: hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl RequestAdapter for HostMatchingAdapter {
    async fn adapt(&self, factory: &RequestFactory, request: HttpRequest) -> Result<HttpRequest> {
        let matches = request
            .host()
            .map(|host| {
                let host = host.to_ascii_lowercase();
                self.hosts.iter().any(|candidate| *candidate == host)
            })
            .unwrap_or(false);
        if matches {
            self.delegate.adapt(factory, request).await
        } else {
            Ok(request)
        }
    }
}

fn authorization_value(scheme: &str, token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("{scheme} {token}")).map_err(|_| {
        RequestEncodingError::InvalidHeaderValue(AUTHORIZATION.as_str().to_string()).into()
    })
}

/// Sets a static `{scheme} {token}` credential header, overwriting any
/// existing value.
pub struct HeaderTokenAuthorizingAdapter {
    header: HeaderName,
    scheme: String,
    token: String,
}

impl HeaderTokenAuthorizingAdapter {
    /// Authorize via the standard `Authorization` header.
    pub fn new(scheme: impl Into<String>, token: impl Into<String>) -> Self {
        Self::for_header(AUTHORIZATION, scheme, token)
    }

    /// Authorize via a custom header.
    pub fn for_header(
        header: HeaderName,
        scheme: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        HeaderTokenAuthorizingAdapter {
            header,
            scheme: scheme.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl RequestAdapter for HeaderTokenAuthorizingAdapter {
    async fn adapt(&self, _factory: &RequestFactory, request: HttpRequest) -> Result<HttpRequest> {
        let value = authorization_value(&self.scheme, &self.token)?;
        Ok(request.with_header(self.header.clone(), value))
    }
}

/// A token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct TokenAuthorization {
    /// Credential applied as `{scheme} {token}`.
    pub token: String,
    /// Expiry instant; the cached token is reused strictly before it.
    pub expires_at: Instant,
}

/// Closure that obtains a fresh token, issuing any requests it needs through
/// the provided factory.
pub type RefreshToken =
    Arc<dyn Fn(RequestFactory) -> BoxFuture<'static, Result<TokenAuthorization>> + Send + Sync>;

type SharedRefresh = Shared<BoxFuture<'static, std::result::Result<TokenAuthorization, String>>>;

/// Bearer-token adapter that refreshes its credential on demand.
///
/// A cached token is applied lock-free of the refresh path while still
/// valid. When it expires, exactly one refresh runs no matter how many
/// requests are waiting; the waiters share the refreshed token, or the same
/// error when the refresh fails.
pub struct RefreshingHeaderTokenAuthorizingAdapter {
    header: HeaderName,
    scheme: String,
    refresh: RefreshToken,
    cached: RwLock<Option<TokenAuthorization>>,
    in_flight: Mutex<Option<SharedRefresh>>,
}

impl RefreshingHeaderTokenAuthorizingAdapter {
    /// Authorize via the standard `Authorization` header.
    pub fn new(scheme: impl Into<String>, refresh: RefreshToken) -> Self {
        Self::for_header(AUTHORIZATION, scheme, refresh)
    }

    /// Authorize via a custom header.
    pub fn for_header(
        header: HeaderName,
        scheme: impl Into<String>,
        refresh: RefreshToken,
    ) -> Self {
        RefreshingHeaderTokenAuthorizingAdapter {
            header,
            scheme: scheme.into(),
            refresh,
            cached: RwLock::new(None),
            in_flight: Mutex::new(None),
        }
    }

    async fn valid_token(&self) -> Option<String> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|auth| Instant::now() < auth.expires_at)
            .map(|auth| auth.token.clone())
    }

    async fn refresh_token(&self, factory: &RequestFactory) -> Result<String> {
        let future = {
            let mut in_flight = self.in_flight.lock().await;
            // Re-check under the lock: a refresh may have completed while
            // this caller was waiting for it.
            if let Some(token) = self.valid_token().await {
                return Ok(token);
            }
            match &*in_flight {
                Some(shared) => shared.clone(),
                None => {
                    debug!("starting token refresh");
                    let refresh = (self.refresh)(factory.clone())
                        .map(|result| result.map_err(|e| e.to_string()))
                        .boxed()
                        .shared();
                    *in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        let result = future.await;
        let mut in_flight = self.in_flight.lock().await;
        in_flight.take();
        match result {
            Ok(authorization) => {
                let token = authorization.token.clone();
                *self.cached.write().await = Some(authorization);
                Ok(token)
            }
            Err(message) => Err(SundayError::TokenRefreshFailed(message)),
        }
    }
}

#[async_trait]
impl RequestAdapter for RefreshingHeaderTokenAuthorizingAdapter {
    async fn adapt(&self, factory: &RequestFactory, request: HttpRequest) -> Result<HttpRequest> {
        let token = match self.valid_token().await {
            Some(token) => token,
            None => self.refresh_token(factory).await?,
        };
        let value = authorization_value(&self.scheme, &token)?;
        Ok(request.with_header(self.header.clone(), value))
    }
}

#[cfg(test)]
#[path = "builtin.test.rs"]
mod tests;
