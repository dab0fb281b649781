//! HTTP exchange types passed across the [`Transport`](crate::Transport) seam.
//!
//! # Design
//! Requests are plain data: the executor builds an [`HttpRequest`] and hands
//! it to whatever transport the client was configured with. Responses carry a
//! pull-based [`ResponseBody`] so the executor decides how much of the body
//! to read, and can drain the rest before returning. Dropping a body releases
//! the underlying connection without reading it.

use std::fmt;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::error::TransportError;

/// A fully resolved request, ready for a transport to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Status, headers and an unread body.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }
}

/// Source of response body chunks. `Ok(None)` marks the end of the body.
#[async_trait]
pub trait BodyReader: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// A response body that is read at most once, chunk by chunk.
pub struct ResponseBody {
    reader: Box<dyn BodyReader>,
    finished: bool,
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl ResponseBody {
    pub fn new(reader: impl BodyReader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            finished: false,
        }
    }

    /// A body already held in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(Buffered(Some(bytes.into())))
    }

    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// True once the reader has reported the end of the body.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        if self.finished {
            return Ok(None);
        }
        let next = self.reader.next_chunk().await?;
        if next.is_none() {
            self.finished = true;
        }
        Ok(next)
    }

    pub async fn read_to_end(&mut self) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Read at most `limit` bytes. The flag reports whether anything past the
    /// limit was seen. A read failure keeps the prefix read so far.
    pub async fn read_capped(&mut self, limit: usize) -> (Bytes, bool) {
        let mut buf = BytesMut::new();
        loop {
            match self.chunk().await {
                Ok(Some(chunk)) => {
                    let room = limit - buf.len();
                    if chunk.len() > room {
                        buf.extend_from_slice(&chunk[..room]);
                        return (buf.freeze(), true);
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(None) => return (buf.freeze(), false),
                Err(err) => {
                    tracing::warn!(error = %err, read = buf.len(), "failed to read response body");
                    return (buf.freeze(), false);
                }
            }
        }
    }

    /// Read and discard whatever is left, returning the discarded byte count.
    pub async fn drain(&mut self) -> Result<u64, TransportError> {
        let mut discarded = 0u64;
        while let Some(chunk) = self.chunk().await? {
            discarded += chunk.len() as u64;
        }
        Ok(discarded)
    }
}

struct Buffered(Option<Bytes>);

#[async_trait]
impl BodyReader for Buffered {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.0.take().filter(|b| !b.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Chunks(VecDeque<Result<Bytes, &'static str>>);

    #[async_trait]
    impl BodyReader for Chunks {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>, TransportError> {
            match self.0.pop_front() {
                Some(Ok(bytes)) => Ok(Some(bytes)),
                Some(Err(msg)) => Err(TransportError::other(msg)),
                None => Ok(None),
            }
        }
    }

    fn chunked(parts: &[&'static str]) -> ResponseBody {
        ResponseBody::new(Chunks(
            parts.iter().map(|&p| Ok(Bytes::from_static(p.as_bytes()))).collect(),
        ))
    }

    #[tokio::test]
    async fn read_to_end_concatenates_chunks() {
        let mut body = chunked(&["{\"a\":", "1}"]);
        assert_eq!(body.read_to_end().await.unwrap(), Bytes::from_static(b"{\"a\":1}"));
        assert!(body.is_finished());
    }

    #[tokio::test]
    async fn read_capped_truncates_at_limit() {
        let mut body = chunked(&["hello ", "world"]);
        let (bytes, truncated) = body.read_capped(8).await;
        assert_eq!(bytes, Bytes::from_static(b"hello wo"));
        assert!(truncated);
        assert!(!body.is_finished());
        assert_eq!(body.drain().await.unwrap(), 0);
        assert!(body.is_finished());
    }

    #[tokio::test]
    async fn read_capped_exact_fit_is_not_truncated() {
        let mut body = chunked(&["abcd"]);
        let (bytes, truncated) = body.read_capped(4).await;
        assert_eq!(bytes.len(), 4);
        assert!(!truncated);
    }

    #[tokio::test]
    async fn read_capped_keeps_prefix_on_read_failure() {
        let mut body = ResponseBody::new(Chunks(VecDeque::from([
            Ok(Bytes::from_static(b"partial")),
            Err("connection reset"),
        ])));
        let (bytes, truncated) = body.read_capped(1024).await;
        assert_eq!(bytes, Bytes::from_static(b"partial"));
        assert!(!truncated);
    }

    #[tokio::test]
    async fn drain_counts_remaining_bytes() {
        let mut body = chunked(&["abc", "defg"]);
        body.chunk().await.unwrap();
        assert_eq!(body.drain().await.unwrap(), 4);
        assert!(body.chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn from_bytes_yields_once() {
        let mut body = ResponseBody::from_bytes("ok");
        assert_eq!(body.chunk().await.unwrap(), Some(Bytes::from_static(b"ok")));
        assert!(body.chunk().await.unwrap().is_none());
        assert!(ResponseBody::empty().chunk().await.unwrap().is_none());
    }
}
