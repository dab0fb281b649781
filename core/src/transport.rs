//! The seam between the executor and the network.
//!
//! A [`Transport`] sends one [`HttpRequest`] and returns the response with its
//! body unread. Implementations must be safe to share between concurrent
//! calls; the executor holds them behind an `Arc` and never locks around
//! `send`. [`ReqwestTransport`] is the default.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::http::{BodyReader, HttpRequest, HttpResponse, ResponseBody};

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send `request` and return as soon as the status and headers arrive.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl From<reqwest::Client> for ReqwestTransport {
    fn from(client: reqwest::Client) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: ResponseBody::new(ReqwestBody(response)),
        })
    }
}

struct ReqwestBody(reqwest::Response);

#[async_trait]
impl BodyReader for ReqwestBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.0.chunk().await?)
    }
}
