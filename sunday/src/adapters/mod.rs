//! Request adapters.
//!
//! Adapters transform a framed request before dispatch, in registration
//! order. An adapter may suspend (token refresh) and may fail, which
//! short-circuits the chain.

mod builtin;

pub use builtin::HeaderTokenAuthorizingAdapter;
pub use builtin::HostMatchingAdapter;
pub use builtin::RefreshToken;
pub use builtin::RefreshingHeaderTokenAuthorizingAdapter;
pub use builtin::TokenAuthorization;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::request::HttpRequest;
use crate::request_factory::RequestFactory;

/// A per-request transformer in the factory's adapter chain.
#[async_trait]
pub trait RequestAdapter: Send + Sync {
    /// Produce the adapted request, or fail the pipeline.
    ///
    /// The factory is provided so adapters can issue their own requests
    /// (e.g. a token refresh) through the same stack.
    async fn adapt(&self, factory: &RequestFactory, request: HttpRequest) -> Result<HttpRequest>;
}

/// Run the chain in registration order.
pub(crate) async fn apply_adapters(
    adapters: &[Arc<dyn RequestAdapter>],
    factory: &RequestFactory,
    mut request: HttpRequest,
) -> Result<HttpRequest> {
    for adapter in adapters {
        request = adapter.adapt(factory, request).await?;
    }
    Ok(request)
}
