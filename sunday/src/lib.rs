//! Sunday is a client-side framework for invoking REST services over HTTP.
//!
//! A [`RequestFactory`] takes a logical request description — method, URI
//! template, typed path/query/header parameters, a typed body and a set of
//! acceptable content types — and produces a correctly framed HTTP request,
//! then decodes the response (or a streaming sequence of server-sent events)
//! into strongly typed values. Pluggable [`adapters::RequestAdapter`]s
//! transform requests before dispatch (host matching, bearer tokens,
//! coordinated token refresh), and error responses surface uniformly as
//! RFC 7807 [`Problem`] documents.
//!
//! # Example
//!
//! ```no_run
//! use sunday::RequestFactory;
//! use sunday::RequestSpec;
//!
//! # async fn example() -> sunday::Result<()> {
//! let factory = RequestFactory::builder("https://api.example.com/v{ver}")
//!     .build()?;
//!
//! let item: serde_json::Value = factory
//!     .result(
//!         &RequestSpec::get("/items/{id}")
//!             .path_param("ver", 1)
//!             .path_param("id", 123),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod codecs;
pub mod error;
pub mod headers;
pub mod media_type;
pub mod problem;
pub mod query_encoder;
pub mod request;
pub mod request_factory;
pub mod session;
pub mod sse;
pub mod uri_template;

pub use error::RequestEncodingError;
pub use error::ResponseDecodingError;
pub use error::Result;
pub use error::SseError;
pub use error::SundayError;
pub use media_type::MediaType;
pub use problem::Problem;
pub use problem::ProblemType;
pub use request::HttpRequest;
pub use request::RequestSpec;
pub use request_factory::RequestFactory;
pub use request_factory::RequestFactoryBuilder;
pub use session::DataEvent;
pub use session::DataEventStream;
pub use session::NetworkSession;
pub use session::ResponseHead;
pub use session::SessionConfiguration;
pub use sse::event_source::EventSource;
pub use sse::event_source::ReadyState;
pub use sse::parser::EventInfo;
pub use sse::parser::EventParser;
pub use sse::typed::EventDecoders;
pub use sse::typed::TypedEventStream;
pub use uri_template::UriTemplate;
