//! Request factory: builds, adapts, dispatches and decodes REST calls.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderValue;
use http::header::ACCEPT;
use http::header::CONTENT_TYPE;
use http::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::adapters::RequestAdapter;
use crate::adapters::apply_adapters;
use crate::codecs::MediaTypeDecoders;
use crate::codecs::MediaTypeEncoders;
use crate::error::RequestEncodingError;
use crate::error::ResponseDecodingError;
use crate::error::Result;
use crate::error::SundayError;
use crate::headers::encode_headers;
use crate::media_type::MediaType;
use crate::problem::Problem;
use crate::problem::ProblemRegistry;
use crate::problem::ProblemType;
use crate::request::HttpRequest;
use crate::request::RequestSpec;
use crate::session::NetworkSession;
use crate::session::ResponseHead;
use crate::session::SessionConfiguration;
use crate::sse::event_source::EventSource;
use crate::sse::event_source::StreamFactory;
use crate::sse::typed::EventDecoders;
use crate::sse::typed::TypedEventStream;
use crate::uri_template::UriTemplate;

const DEFAULT_USER_AGENT: &str = concat!("sunday-rust/", env!("CARGO_PKG_VERSION"));

struct FactoryInner {
    base_url: UriTemplate,
    session: NetworkSession,
    encoders: MediaTypeEncoders,
    decoders: MediaTypeDecoders,
    adapters: Vec<Arc<dyn RequestAdapter>>,
    problems: ProblemRegistry,
}

/// Builds transport requests from logical request specs, executes them, and
/// decodes the responses.
///
/// Cheap to clone and safe to share across tasks; registries and the adapter
/// chain are immutable once built.
#[derive(Clone)]
pub struct RequestFactory {
    inner: Arc<FactoryInner>,
}

impl RequestFactory {
    /// Start configuring a factory rooted at a base URL template.
    pub fn builder(base_url: impl Into<UriTemplate>) -> RequestFactoryBuilder {
        RequestFactoryBuilder {
            base_url: base_url.into(),
            session_configuration: SessionConfiguration::default(),
            encoders: None,
            decoders: None,
            adapters: Vec::new(),
            problems: ProblemRegistry::new(),
        }
    }

    /// The underlying network session.
    pub fn session(&self) -> &NetworkSession {
        &self.inner.session
    }

    /// The decoder registry in use.
    pub fn decoders(&self) -> &MediaTypeDecoders {
        &self.inner.decoders
    }

    /// Build the transport request for a spec and run the adapter chain.
    pub async fn request(&self, spec: &RequestSpec) -> Result<HttpRequest> {
        let request = self.build_request(spec)?;
        apply_adapters(&self.inner.adapters, self, request).await
    }

    /// Execute a spec and return the raw validated response without
    /// decoding.
    pub async fn response(&self, spec: &RequestSpec) -> Result<(Bytes, ResponseHead)> {
        let request = self.request(spec).await?;
        self.inner.session.validated_data(request).await
    }

    /// Execute a spec and decode the response into a typed value.
    pub async fn result<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T> {
        let (value, _) = self.result_response(spec).await?;
        Ok(value)
    }

    /// Execute a spec, decoding the response and surfacing the raw status
    /// and headers alongside the value.
    pub async fn result_response<T: DeserializeOwned>(
        &self,
        spec: &RequestSpec,
    ) -> Result<(T, ResponseHead)> {
        let (data, head) = self.response(spec).await?;
        if !head.status.is_success() {
            return Err(self.problem_for(&head, &data));
        }
        let value = self.decode_body(&head, &data)?;
        Ok((value, head))
    }

    /// Create an event source for a spec.
    ///
    /// The request is rebuilt through the adapter chain on every reconnect,
    /// so refreshed credentials apply.
    pub fn event_source(&self, spec: RequestSpec) -> EventSource {
        EventSource::new(self.stream_factory(spec))
    }

    /// Create an event source with an event-inactivity watchdog.
    pub fn event_source_with_timeout(
        &self,
        spec: RequestSpec,
        timeout_interval: Duration,
        check_interval: Duration,
    ) -> EventSource {
        EventSource::with_inactivity_timeout(
            self.stream_factory(spec),
            timeout_interval,
            check_interval,
        )
    }

    /// Create a typed event stream for a spec.
    pub fn event_stream<T: Send + 'static>(
        &self,
        spec: RequestSpec,
        decoders: EventDecoders<T>,
    ) -> TypedEventStream<T> {
        TypedEventStream::new(self.event_source(spec), decoders)
    }

    fn stream_factory(&self, spec: RequestSpec) -> StreamFactory {
        let factory = self.clone();
        let spec = spec.accept_types(vec![MediaType::event_stream()]);
        Arc::new(move |headers| {
            let factory = factory.clone();
            let spec = spec.clone();
            Box::pin(async move {
                let mut request = factory.request(&spec).await?;
                for (name, value) in headers.iter() {
                    request.headers.insert(name.clone(), value.clone());
                }
                let stream = factory.inner.session.data_event_stream(request).await?;
                Ok(Some(stream))
            })
        })
    }

    /// Assemble the transport request: URL expansion, query encoding,
    /// content negotiation, body encoding and extra headers.
    fn build_request(&self, spec: &RequestSpec) -> Result<HttpRequest> {
        let mut url = self.inner.base_url.complete(&spec.path, &spec.path_params)?;

        if !spec.query_params.is_empty() {
            let media_type = MediaType::www_form_url_encoded();
            let encoder = self.inner.encoders.find(&media_type)?;
            let encoded = self.inner.encoders.encode_dynamic(
                &media_type,
                &encoder,
                &Value::Object(spec.query_params.clone()),
            )?;
            let query = String::from_utf8_lossy(&encoded).into_owned();
            url.set_query(Some(&query));
        }

        let mut request = HttpRequest::new(spec.method.clone(), url);
        let extra_headers = encode_headers(&spec.headers)?;

        if !spec.accept_types.is_empty() {
            let supported: Vec<String> = spec
                .accept_types
                .iter()
                .filter(|media_type| self.inner.decoders.supports(media_type))
                .map(ToString::to_string)
                .collect();
            if supported.is_empty() {
                return Err(
                    RequestEncodingError::NoSupportedAcceptTypes(spec.accept_types.clone()).into(),
                );
            }
            let accept = supported.join(" , ");
            let value = HeaderValue::from_str(&accept).map_err(|_| {
                RequestEncodingError::InvalidHeaderValue(ACCEPT.as_str().to_string())
            })?;
            request.headers.insert(ACCEPT, value);
        }

        if let Some(body) = &spec.body {
            let content_type = spec
                .content_types
                .iter()
                .find(|media_type| self.inner.encoders.supports(media_type))
                .ok_or_else(|| {
                    RequestEncodingError::NoSupportedContentTypes(spec.content_types.clone())
                })?;
            let encoder = self.inner.encoders.find(content_type)?;
            request.body = Some(
                self.inner
                    .encoders
                    .encode_dynamic(content_type, &encoder, body)?,
            );
            if !extra_headers.contains_key(CONTENT_TYPE) {
                let value =
                    HeaderValue::from_str(&content_type.to_string()).map_err(|_| {
                        RequestEncodingError::InvalidHeaderValue(CONTENT_TYPE.as_str().to_string())
                    })?;
                request.headers.insert(CONTENT_TYPE, value);
            }
        }

        for (name, value) in extra_headers.iter() {
            request.headers.append(name.clone(), value.clone());
        }

        if !request.headers.contains_key(USER_AGENT) {
            request
                .headers
                .insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }

        debug!(method = %request.method, url = %request.url, "built request");
        Ok(request)
    }

    /// Decode a successful response body into the target type.
    fn decode_body<T: DeserializeOwned>(&self, head: &ResponseHead, data: &Bytes) -> Result<T> {
        let no_content = matches!(head.status.as_u16(), 204 | 205);
        if no_content && !data.is_empty() {
            return Err(SundayError::UnexpectedDataResponse);
        }
        if data.is_empty() {
            // Unit-shaped targets accept an empty body; everything else is
            // an unexpected empty response.
            return serde_json::from_value(Value::Null)
                .map_err(|_| SundayError::UnexpectedEmptyResponse);
        }

        let raw = head
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let media_type: MediaType = raw
            .parse()
            .map_err(|_| ResponseDecodingError::InvalidContentType(raw.to_string()))?;

        Ok(self.inner.decoders.decode(&media_type, data)?)
    }

    /// Turn an error response into the problem it carries.
    fn problem_for(&self, head: &ResponseHead, data: &Bytes) -> SundayError {
        if data.is_empty() {
            return SundayError::Problem(Box::new(Problem::from_status(head.status)));
        }

        let content_type = head
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.parse::<MediaType>().ok())
            .filter(|media_type| {
                media_type.compatible(&MediaType::problem_json())
                    || media_type.compatible(&MediaType::problem_cbor())
            });

        match content_type {
            Some(media_type) => match self.inner.decoders.decode_dynamic(&media_type, data) {
                Ok(value) => match self.inner.problems.decode(&value) {
                    Ok(problem) => SundayError::Problem(problem),
                    Err(error) => SundayError::ResponseDecoding(error),
                },
                Err(error) => SundayError::ResponseDecoding(error),
            },
            // Not a problem document: report the status line and discard
            // the body.
            None => SundayError::Problem(Box::new(Problem::from_status(head.status))),
        }
    }
}

impl std::fmt::Debug for RequestFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestFactory")
            .field("base_url", &self.inner.base_url)
            .field("adapters", &self.inner.adapters.len())
            .field("problems", &self.inner.problems)
            .finish_non_exhaustive()
    }
}

/// Configuration surface for [`RequestFactory`].
pub struct RequestFactoryBuilder {
    base_url: UriTemplate,
    session_configuration: SessionConfiguration,
    encoders: Option<MediaTypeEncoders>,
    decoders: Option<MediaTypeDecoders>,
    adapters: Vec<Arc<dyn RequestAdapter>>,
    problems: ProblemRegistry,
}

impl RequestFactoryBuilder {
    /// Replace the session configuration.
    pub fn session_configuration(mut self, configuration: SessionConfiguration) -> Self {
        self.session_configuration = configuration;
        self
    }

    /// Per-read inactivity timeout for requests.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.session_configuration.request_timeout = Some(timeout);
        self
    }

    /// Bound on the total lifetime of one request.
    pub fn resource_timeout(mut self, timeout: Duration) -> Self {
        self.session_configuration.resource_timeout = Some(timeout);
        self
    }

    /// Replace the encoder registry.
    pub fn media_type_encoders(mut self, encoders: MediaTypeEncoders) -> Self {
        self.encoders = Some(encoders);
        self
    }

    /// Replace the decoder registry.
    pub fn media_type_decoders(mut self, decoders: MediaTypeDecoders) -> Self {
        self.decoders = Some(decoders);
        self
    }

    /// Append an adapter to the chain.
    pub fn adapter(mut self, adapter: Arc<dyn RequestAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Register a concrete problem type for a `type` URI.
    pub fn problem_type<T: ProblemType + DeserializeOwned>(mut self, type_uri: &str) -> Self {
        self.problems.register::<T>(type_uri);
        self
    }

    /// Build the factory. Registries default to the standard codecs.
    pub fn build(self) -> Result<RequestFactory> {
        let session = NetworkSession::new(self.session_configuration)?;
        Ok(RequestFactory {
            inner: Arc::new(FactoryInner {
                base_url: self.base_url,
                session,
                encoders: self
                    .encoders
                    .unwrap_or_else(MediaTypeEncoders::default_registry),
                decoders: self
                    .decoders
                    .unwrap_or_else(MediaTypeDecoders::default_registry),
                adapters: self.adapters,
                problems: self.problems,
            }),
        })
    }
}

#[cfg(test)]
#[path = "request_factory.test.rs"]
mod tests;
