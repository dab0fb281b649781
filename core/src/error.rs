//! Error taxonomy for the REST client.
//!
//! # Design
//! Every failed call produces exactly one of three errors:
//!
//! - [`InternalError`]: the request could not be built, encoded, or the
//!   response could not be decoded. Fixing it means fixing the caller.
//! - [`InfrastructureError`]: the transport could not complete the exchange
//!   (DNS, connect, TLS, timeout, cancellation). Worth retrying later.
//! - [`ApiError`]: the exchange completed but the server answered with a
//!   status >= 400. The status and raw body are kept for inspection.
//!
//! [`Error`] is the sum of the three. The standalone structs exist so callers
//! can carry one variant around on its own; the `is_*` and [`as_api_error`]
//! helpers recognise both forms anywhere in a `source()` chain, so a
//! `restkit::Error` wrapped inside a caller's own error type still classifies.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

/// Opaque cause carried by internal and transport errors.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Any failure returned by [`Client::execute`](crate::Client::execute).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Internal(#[from] InternalError),

    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::Infrastructure(_))
    }

    pub fn is_api(&self) -> bool {
        matches!(self, Error::Api(_))
    }

    /// The API error record, if the server rejected the request.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Rejected [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("rest: invalid config: base URL {base_url:?} is not an absolute URL: {source}")]
    InvalidBaseUrl {
        base_url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("rest: invalid config: base URL {base_url:?} cannot be used as a base")]
    NotABase { base_url: String },
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

/// Step of request preparation or response decoding that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    EmptyMethod,
    InvalidMethod,
    ResolveUrl,
    MarshalPayload,
    DecodeResponse,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::EmptyMethod => "empty method",
            Operation::InvalidMethod => "invalid method",
            Operation::ResolveUrl => "resolve url",
            Operation::MarshalPayload => "marshal payload",
            Operation::DecodeResponse => "decode response",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The library failed before the request left, or while decoding a
/// successful response.
#[derive(Debug, thiserror::Error)]
#[error("rest: {op}: {source}")]
pub struct InternalError {
    pub op: Operation,
    #[source]
    pub source: BoxError,
}

impl InternalError {
    pub fn new(op: Operation, source: impl Into<BoxError>) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Infrastructure
// ---------------------------------------------------------------------------

/// Failure reported by a [`Transport`](crate::Transport) or by the executor's
/// own deadline handling.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The caller's cancellation token fired before the exchange finished.
    #[error("request cancelled")]
    Cancelled,

    /// The configured per-call deadline elapsed.
    #[error("deadline of {0:?} exceeded")]
    TimedOut(Duration),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Failure from a custom transport.
    #[error("{0}")]
    Other(BoxError),
}

impl TransportError {
    pub fn other(source: impl Into<BoxError>) -> Self {
        TransportError::Other(source.into())
    }
}

/// The transport could not complete the exchange with `url`.
#[derive(Debug, thiserror::Error)]
#[error("rest: infrastructure error contacting {url}: {source}")]
pub struct InfrastructureError {
    pub url: String,
    #[source]
    pub source: TransportError,
}

impl InfrastructureError {
    pub fn new(url: impl Into<String>, source: TransportError) -> Self {
        Self {
            url: url.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

/// The server answered with a status code >= 400.
///
/// `body` holds at most the first [`MAX_ERROR_BODY`](crate::client::MAX_ERROR_BODY)
/// bytes of the response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("rest: API error {status} from {url}: {}", String::from_utf8_lossy(.body))]
pub struct ApiError {
    pub status: u16,
    pub url: String,
    pub body: Bytes,
}

/// Why [`ApiError::parse_body`] could not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum ParseBodyError {
    #[error("rest: empty error body")]
    EmptyBody,

    #[error("rest: failed to unmarshal body: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl ApiError {
    pub fn new(status: u16, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the error body as JSON into `T`.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, ParseBodyError> {
        if self.body.is_empty() {
            return Err(ParseBodyError::EmptyBody);
        }
        serde_json::from_slice(&self.body).map_err(ParseBodyError::Malformed)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn is_bad_request(&self) -> bool {
        self.status == 400
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

// ---------------------------------------------------------------------------
// Chain inspection
// ---------------------------------------------------------------------------

fn chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

/// True if `err` or any error it wraps is an [`InternalError`].
pub fn is_internal_error(err: &(dyn StdError + 'static)) -> bool {
    chain(err).any(|e| {
        e.downcast_ref::<Error>().is_some_and(Error::is_internal) || e.is::<InternalError>()
    })
}

/// True if `err` or any error it wraps is an [`InfrastructureError`].
pub fn is_infrastructure_error(err: &(dyn StdError + 'static)) -> bool {
    chain(err).any(|e| {
        e.downcast_ref::<Error>().is_some_and(Error::is_infrastructure)
            || e.is::<InfrastructureError>()
    })
}

/// True if `err` or any error it wraps is an [`ApiError`].
pub fn is_api_error(err: &(dyn StdError + 'static)) -> bool {
    as_api_error(err).is_some()
}

/// Find the [`ApiError`] in `err`'s chain.
pub fn as_api_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a ApiError> {
    chain(err).find_map(|e| match e.downcast_ref::<Error>() {
        Some(wrapped) => wrapped.as_api(),
        None => e.downcast_ref::<ApiError>(),
    })
}

/// True if `err` wraps an [`ApiError`] with a 4xx status.
pub fn is_client_error(err: &(dyn StdError + 'static)) -> bool {
    as_api_error(err).is_some_and(ApiError::is_client_error)
}

/// True if `err` wraps an [`ApiError`] with a 5xx status.
pub fn is_server_error(err: &(dyn StdError + 'static)) -> bool {
    as_api_error(err).is_some_and(ApiError::is_server_error)
}
