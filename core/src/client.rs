//! Request execution: resolve, encode, send, classify.
//!
//! # Design
//! `Client` holds only immutable configuration: the parsed base URL, a shared
//! transport and an optional deadline. Every call is independent. A call
//! validates its inputs and encodes the payload before touching the
//! transport, so input mistakes surface as [`InternalError`] without any
//! network traffic. Once a response arrives its body is always drained after
//! classification, whichever way classification went.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{
    ApiError, ConfigError, Error, InfrastructureError, InternalError, Operation, TransportError,
};
use crate::http::{HttpRequest, HttpResponse, ResponseBody};
use crate::transport::{ReqwestTransport, Transport};

/// Largest prefix of an error response body kept in [`ApiError::body`].
pub const MAX_ERROR_BODY: usize = 1 << 20;

const APPLICATION_JSON: &str = "application/json";

/// JSON-over-HTTP client. Cheap to clone; clones share the transport.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Option<Url>,
    transport: Arc<dyn Transport>,
    timeout: Option<Duration>,
}

impl Client {
    /// Validate `config` and build a client.
    ///
    /// Fails if `base_url` is non-empty and not an absolute URL.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let base_url = if config.base_url.is_empty() {
            None
        } else {
            Some(parse_base_url(&config.base_url)?)
        };
        let transport = config
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::default()));

        Ok(Self {
            base_url,
            transport,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Send one JSON request and decode the response into `out`.
    ///
    /// `payload`, when present, is encoded as the JSON body. `Accept` and,
    /// for requests with a body, `Content-Type` default to
    /// `application/json` unless already present in `headers`.
    ///
    /// `out` is left untouched on a 204 response and on every error.
    ///
    /// `path` is resolved with [`resolve`](Self::resolve), so an absolute URL
    /// sends the request there instead of to the base address.
    pub async fn execute<P, T>(
        &self,
        ctx: &CancellationToken,
        method: &str,
        path: &str,
        mut headers: HeaderMap,
        payload: Option<&P>,
        out: Option<&mut T>,
    ) -> Result<(), Error>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (method, url) = self.prepare(method, path)?;

        let body = match payload {
            Some(payload) => Some(
                serde_json::to_vec(payload)
                    .map_err(|err| InternalError::new(Operation::MarshalPayload, err))?,
            ),
            None => None,
        };

        headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static(APPLICATION_JSON));
        if body.is_some() {
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(APPLICATION_JSON));
        }

        let request = HttpRequest {
            method,
            url,
            headers,
            body: body.map(Bytes::from),
        };
        self.dispatch(ctx, request, out).await
    }

    /// Like [`execute`](Self::execute), but sends `body` as is and adds no
    /// default headers.
    pub async fn execute_raw<T>(
        &self,
        ctx: &CancellationToken,
        method: &str,
        path: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
        out: Option<&mut T>,
    ) -> Result<(), Error>
    where
        T: DeserializeOwned,
    {
        let (method, url) = self.prepare(method, path)?;
        let request = HttpRequest {
            method,
            url,
            headers,
            body,
        };
        self.dispatch(ctx, request, out).await
    }

    fn prepare(&self, method: &str, path: &str) -> Result<(Method, Url), InternalError> {
        let method = parse_method(method)?;
        let url = self.resolve(path)?;
        Ok((method, url))
    }

    /// Resolve `path` against the base URL.
    ///
    /// Relative paths are joined below the base path, keeping their query
    /// string. A colon in the first segment (`tasks:cancel`) does not make the
    /// path a URL.
    ///
    /// A `path` that is itself an absolute URL (`https://other.example/x`)
    /// replaces the base entirely, host included. Callers forwarding
    /// untrusted paths should reject those first.
    pub fn resolve(&self, path: &str) -> Result<Url, InternalError> {
        if let Ok(url) = Url::parse(path) {
            if !url.cannot_be_a_base() {
                return Ok(url);
            }
        }

        let base = self.base_url.as_ref().ok_or_else(|| {
            InternalError::new(Operation::ResolveUrl, url::ParseError::RelativeUrlWithoutBase)
        })?;
        // `./` keeps a leading `name:` segment from parsing as a scheme.
        let relative = format!("./{}", path.trim_start_matches('/'));
        base.join(&relative)
            .map_err(|err| InternalError::new(Operation::ResolveUrl, err))
    }

    async fn dispatch<T>(
        &self,
        ctx: &CancellationToken,
        request: HttpRequest,
        out: Option<&mut T>,
    ) -> Result<(), Error>
    where
        T: DeserializeOwned,
    {
        let url = request.url.to_string();
        tracing::debug!(method = %request.method, url = %url, "dispatching request");

        let exchange = self.exchange(request, &url, out);
        let bounded = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, exchange).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(InfrastructureError::new(&url, TransportError::TimedOut(limit)).into()),
                },
                None => exchange.await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                Err(InfrastructureError::new(&url, TransportError::Cancelled).into())
            }
            outcome = bounded => outcome,
        }
    }

    async fn exchange<T>(
        &self,
        request: HttpRequest,
        url: &str,
        out: Option<&mut T>,
    ) -> Result<(), Error>
    where
        T: DeserializeOwned,
    {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|source| InfrastructureError::new(url, source))?;

        let HttpResponse {
            status, mut body, ..
        } = response;
        tracing::debug!(status, url, "received response");

        let outcome = read_outcome(status, url, &mut body, out).await;
        match body.drain().await {
            Ok(0) => {}
            Ok(discarded) => tracing::trace!(discarded, url, "drained unread response body"),
            Err(err) => tracing::debug!(error = %err, url, "failed to drain response body"),
        }
        outcome
    }
}

async fn read_outcome<T>(
    status: u16,
    url: &str,
    body: &mut ResponseBody,
    out: Option<&mut T>,
) -> Result<(), Error>
where
    T: DeserializeOwned,
{
    if status >= 400 {
        let (bytes, truncated) = body.read_capped(MAX_ERROR_BODY).await;
        if truncated {
            tracing::warn!(status, url, limit = MAX_ERROR_BODY, "error response body truncated");
        }
        return Err(ApiError::new(status, url, bytes).into());
    }

    if status == 204 {
        return Ok(());
    }

    let Some(out) = out else {
        return Ok(());
    };

    let bytes = body
        .read_to_end()
        .await
        .map_err(|source| InfrastructureError::new(url, source))?;
    *out = serde_json::from_slice(&bytes)
        .map_err(|err| InternalError::new(Operation::DecodeResponse, err))?;
    Ok(())
}

fn parse_method(method: &str) -> Result<Method, InternalError> {
    if method.is_empty() {
        return Err(InternalError::new(
            Operation::EmptyMethod,
            "HTTP method must not be empty",
        ));
    }
    Method::from_bytes(method.as_bytes())
        .map_err(|err| InternalError::new(Operation::InvalidMethod, err))
}

/// Parse the configured base URL, making its path end in `/` so relative
/// paths are joined below it instead of replacing its last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl {
        base_url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::NotABase {
            base_url: raw.to_string(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
