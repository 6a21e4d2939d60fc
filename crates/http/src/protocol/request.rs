//! Request head handling.
//!
//! The decoder produces the head before the body has arrived; [`RequestHeader`]
//! holds it until the body is complete and then turns into a full `Request`.

use http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Method, Request, Uri, Version};

use crate::protocol::ParseError;

/// Largest request body accepted, in bytes.
pub(crate) const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// A decoded request head, wrapping a bodyless `http::Request<()>`.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    /// Attaches a body, converting the head into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Number of body bytes that follow this head.
    ///
    /// Only `Content-Length` framing is accepted. A request carrying
    /// `Transfer-Encoding` is rejected, so is one whose length exceeds the body limit.
    pub fn content_length(&self) -> Result<u64, ParseError> {
        // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
        if self.headers().contains_key(TRANSFER_ENCODING) {
            return Err(ParseError::UnsupportedTransferEncoding);
        }

        let Some(cl_value) = self.headers().get(CONTENT_LENGTH) else {
            return Ok(0);
        };

        let cl_str = cl_value.to_str().map_err(ParseError::invalid_content_length)?;
        let length =
            cl_str.trim().parse::<u64>().map_err(|e| ParseError::invalid_content_length(format!("value {cl_str} is not u64: {e}")))?;

        if length > MAX_BODY_BYTES {
            return Err(ParseError::too_large_body(length, MAX_BODY_BYTES));
        }
        Ok(length)
    }
}

/// Whether the connection should stay open after answering `request`.
///
/// HTTP/1.1 defaults to keep-alive unless the client sends `Connection: close`;
/// HTTP/1.0 defaults to close unless the client sends `Connection: keep-alive`.
pub fn is_keep_alive<T>(request: &Request<T>) -> bool {
    let connection = request.headers().get(CONNECTION).and_then(|v| v.to_str().ok()).map(str::to_ascii_lowercase);

    match request.version() {
        Version::HTTP_11 => connection.as_deref() != Some("close"),
        Version::HTTP_10 => connection.as_deref() == Some("keep-alive"),
        _ => false,
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
