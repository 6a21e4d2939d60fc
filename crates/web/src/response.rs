//! The response sink a [`Context`](crate::Context) writes into.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Response, StatusCode};
use tracing::{debug, warn};

/// Buffers the response of one request.
///
/// The status may change freely until the first body write, which commits it.
/// Later status or header changes are logged and ignored, so what
/// [`status`](Self::status) reports is always what goes on the wire.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    committed: bool,
    closed: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            committed: false,
            closed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Number of body bytes written so far.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Whether the status line is committed, i.e. any body was written.
    pub fn written(&self) -> bool {
        self.committed
    }

    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            if status != self.status {
                warn!(current = %self.status, ignored = %status, "response already committed, status not changed");
            }
            return;
        }
        self.status = status;
    }

    /// Sets (replacing) a header; invalid names or values are logged and skipped.
    pub fn set_header<K, V>(&mut self, key: K, value: V)
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: std::fmt::Display,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: std::fmt::Display,
    {
        if self.committed {
            warn!("response already committed, header not set");
            return;
        }

        let name = match HeaderName::try_from(key) {
            Ok(name) => name,
            Err(e) => {
                warn!("invalid header name, cause: {}", e);
                return;
            }
        };
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => warn!(header = %name, "invalid header value, cause: {}", e),
        }
    }

    /// Appends to the body, committing the status. Returns the number of bytes taken.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.closed {
            debug!(len = data.len(), "response closed, dropping output");
            return 0;
        }
        self.committed = true;
        self.body.extend_from_slice(data);
        data.len()
    }

    /// Stops accepting body writes.
    pub(crate) fn close(&mut self) {
        self.committed = true;
        self.closed = true;
    }

    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    #[test]
    fn status_is_free_until_first_write() {
        let mut writer = ResponseWriter::new();
        writer.write_header(StatusCode::CREATED);
        writer.write_header(StatusCode::ACCEPTED);
        assert_eq!(writer.status(), StatusCode::ACCEPTED);
        assert!(!writer.written());

        writer.write(b"body");
        writer.write_header(StatusCode::NOT_FOUND);
        writer.set_header(CONTENT_TYPE, "text/plain");

        assert!(writer.written());
        assert_eq!(writer.status(), StatusCode::ACCEPTED);
        assert!(writer.headers().is_empty());
    }

    #[test]
    fn writes_accumulate() {
        let mut writer = ResponseWriter::new();
        assert_eq!(writer.write(b"hello "), 6);
        assert_eq!(writer.write(b"world"), 5);
        assert_eq!(writer.size(), 11);

        let response = writer.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"hello world");
    }

    #[test]
    fn invalid_headers_are_skipped() {
        let mut writer = ResponseWriter::new();
        writer.set_header("bad header", "x");
        writer.set_header("x-ok", "fine");
        writer.set_header("x-bad", "line\nbreak");

        assert_eq!(writer.headers().len(), 1);
        assert_eq!(writer.headers().get("x-ok").unwrap(), "fine");
    }

    #[test]
    fn closed_writer_drops_output() {
        let mut writer = ResponseWriter::new();
        writer.write(b"partial");
        writer.close();
        assert_eq!(writer.write(b" more"), 0);
        assert_eq!(writer.into_response().body().as_ref(), b"partial");
    }
}
