//! Minimal JSON-over-HTTP client with a three-tier error taxonomy.
//!
//! # Overview
//! [`Client::execute`] resolves a path against the configured base URL,
//! encodes an optional payload as JSON, sends exactly one request through a
//! [`Transport`] and decodes the response. Failures come back as one
//! [`Error`]:
//!
//! - [`Error::Internal`]: bad input, payload encoding or response decoding.
//! - [`Error::Infrastructure`]: the exchange itself failed or was cancelled.
//! - [`Error::Api`]: the server answered with a status >= 400.
//!
//! # Design
//! - `Client` is immutable and cheap to clone; calls share only the transport.
//! - The transport is injected behind `Arc<dyn Transport>`; [`ReqwestTransport`]
//!   is used when none is configured.
//! - Requests and responses cross the transport seam as plain data
//!   ([`HttpRequest`], [`HttpResponse`]), so tests can script the network.
//! - Classification helpers walk `source()` chains, so errors stay
//!   classifiable after callers wrap them.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;

pub use client::{Client, MAX_ERROR_BODY};
pub use config::ClientConfig;
pub use error::{
    as_api_error, is_api_error, is_client_error, is_infrastructure_error, is_internal_error,
    is_server_error, ApiError, BoxError, ConfigError, Error, InfrastructureError, InternalError,
    Operation, ParseBodyError, TransportError,
};
pub use http::{BodyReader, HttpRequest, HttpResponse, ResponseBody};
pub use transport::{ReqwestTransport, Transport};

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use tokio_util::sync::CancellationToken;
